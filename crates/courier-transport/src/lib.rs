//! # Courier Transport
//!
//! The browser-driven WhatsApp Web transport: a minimal W3C WebDriver
//! client and the session logic on top of it (login wait, chat URL
//! navigation, send-button click, delivery check). The rest of the
//! system only sees this through the `Transport` capability trait.

pub mod webdriver;
pub mod whatsapp;

pub use webdriver::WebDriverClient;
pub use whatsapp::WhatsAppWebTransport;
