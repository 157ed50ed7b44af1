//! Minimal W3C WebDriver client — just the handful of commands the
//! WhatsApp Web session needs: session lifecycle, navigation, xpath
//! lookup with polling, click, and screenshots. Speaks the JSON wire
//! protocol over HTTP against a chromedriver-compatible endpoint.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use courier_core::{CourierError, Result};

/// W3C element identifier key in find-element responses.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// One WebDriver session against a running driver process.
pub struct WebDriverClient {
    base: String,
    http: reqwest::Client,
    session: Option<String>,
}

impl WebDriverClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            session: None,
        }
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Create a new browser session with the given chromium arguments.
    pub async fn start_session(&mut self, browser_args: &[String]) -> Result<()> {
        let body = serde_json::json!({
            "capabilities": {
                "alwaysMatch": {
                    "goog:chromeOptions": { "args": browser_args }
                }
            }
        });
        let value = self.post(&format!("{}/session", self.base), &body).await?;
        let session_id = value["sessionId"]
            .as_str()
            .or_else(|| value["value"]["sessionId"].as_str())
            .ok_or_else(|| CourierError::transport("no sessionId in WebDriver response"))?
            .to_string();
        tracing::debug!("WebDriver session started: {session_id}");
        self.session = Some(session_id);
        Ok(())
    }

    /// Tear down the session. Idempotent.
    pub async fn end_session(&mut self) -> Result<()> {
        if let Some(id) = self.session.take() {
            self.http
                .delete(format!("{}/session/{id}", self.base))
                .send()
                .await
                .map_err(|e| CourierError::transport(format!("delete session: {e}")))?;
            tracing::debug!("WebDriver session ended: {id}");
        }
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        let endpoint = self.session_url("url")?;
        self.post(&endpoint, &serde_json::json!({ "url": url }))
            .await?;
        Ok(())
    }

    /// Find an element by xpath. Errors when the element is not present.
    pub async fn find_element(&self, xpath: &str) -> Result<String> {
        let endpoint = self.session_url("element")?;
        let value = self
            .post(
                &endpoint,
                &serde_json::json!({ "using": "xpath", "value": xpath }),
            )
            .await?;
        value["value"][ELEMENT_KEY]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CourierError::transport(format!("element not found: {xpath}")))
    }

    /// Poll for an element until it appears or the timeout elapses.
    pub async fn wait_for_element(
        &self,
        xpath: &str,
        timeout: std::time::Duration,
    ) -> Result<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.find_element(xpath).await {
                Ok(id) => return Ok(id),
                Err(_) if tokio::time::Instant::now() < deadline => {
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
                Err(_) => {
                    return Err(CourierError::transport(format!(
                        "timed out after {}s waiting for {xpath}",
                        timeout.as_secs()
                    )));
                }
            }
        }
    }

    pub async fn click(&self, element_id: &str) -> Result<()> {
        let endpoint = self.session_url(&format!("element/{element_id}/click"))?;
        self.post(&endpoint, &serde_json::json!({})).await?;
        Ok(())
    }

    /// Capture a PNG screenshot of the current page.
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        let endpoint = self.session_url("screenshot")?;
        let resp = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| CourierError::transport(format!("screenshot: {e}")))?;
        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CourierError::transport(format!("screenshot response: {e}")))?;
        let encoded = value["value"]
            .as_str()
            .ok_or_else(|| CourierError::transport("screenshot response missing data"))?;
        BASE64
            .decode(encoded)
            .map_err(|e| CourierError::transport(format!("screenshot decode: {e}")))
    }

    fn session_url(&self, suffix: &str) -> Result<String> {
        let id = self
            .session
            .as_ref()
            .ok_or_else(|| CourierError::TransportNotConnected("no WebDriver session".into()))?;
        Ok(format!("{}/session/{id}/{suffix}", self.base))
    }

    async fn post(&self, url: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| CourierError::transport(format!("WebDriver request failed: {e}")))?;
        let status = resp.status();
        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CourierError::transport(format!("invalid WebDriver response: {e}")))?;
        if !status.is_success() {
            let error = value["value"]["message"]
                .as_str()
                .unwrap_or("unknown WebDriver error");
            return Err(CourierError::transport(format!(
                "WebDriver error {status}: {error}"
            )));
        }
        Ok(value)
    }
}
