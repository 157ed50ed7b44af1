//! Template rendering — substitutes `{name}`-style placeholders with
//! recipient attributes. `{{` and `}}` escape to literal braces.

use courier_core::{CourierError, Recipient, Result, Template};

/// Render a template for a recipient. A placeholder naming an attribute
/// the recipient does not have is an error the caller records as a
/// failed dispatch.
pub fn compose(template: &Template, recipient: &Recipient) -> Result<String> {
    let content = &template.content;
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut field = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    field.push(c);
                }
                if !closed {
                    return Err(CourierError::compose(format!(
                        "unbalanced '{{' in template '{}'",
                        template.name
                    )));
                }
                match field.as_str() {
                    "name" => out.push_str(&recipient.name),
                    "phone" => out.push_str(&recipient.phone),
                    other => {
                        return Err(CourierError::compose(format!(
                            "template '{}' references unknown attribute '{other}'",
                            template.name
                        )));
                    }
                }
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(CourierError::compose(format!(
                        "unbalanced '}}' in template '{}'",
                        template.name
                    )));
                }
            }
            c => out.push(c),
        }
    }

    Ok(out)
}
