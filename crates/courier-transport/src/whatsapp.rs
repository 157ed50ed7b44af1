//! WhatsApp Web transport — drives a persistent browser session through
//! WebDriver. Connecting opens web.whatsapp.com and waits for the chat
//! pane (QR scan happens out of band, the profile dir keeps the login).
//! Sending navigates to the prefilled chat URL and clicks the send
//! button. Failures surface as `false`, never as errors.

use async_trait::async_trait;

use courier_core::config::TransportConfig;
use courier_core::{CourierError, Result, Transport};

use crate::webdriver::WebDriverClient;

const CHAT_PANE_XPATH: &str = "//div[@id='side']";
const SEND_BUTTON_XPATH: &str = "//span[@data-icon='send']";
const DELIVERY_CHECK_XPATH: &str = "//span[@data-icon='msg-check']";
const INVALID_NUMBER_XPATH: &str =
    "//div[contains(text(),'Phone number shared via url is invalid')]";

/// The one stateful messaging session of the process.
pub struct WhatsAppWebTransport {
    cfg: TransportConfig,
    driver: WebDriverClient,
    connected: bool,
}

impl WhatsAppWebTransport {
    pub fn new(cfg: TransportConfig) -> Self {
        let driver = WebDriverClient::new(&cfg.webdriver_url);
        Self {
            cfg,
            driver,
            connected: false,
        }
    }

    /// Strip a phone number down to digits and apply the country-code
    /// rules: a bare 10-digit local number gets the code prepended, a
    /// leading 0 is replaced by it.
    pub fn normalize_phone(raw: &str, country_code: &str) -> String {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() == 10 {
            format!("{country_code}{digits}")
        } else if let Some(rest) = digits.strip_prefix('0') {
            format!("{country_code}{rest}")
        } else {
            digits
        }
    }

    /// Prefilled chat URL for a normalized number.
    fn chat_url(phone: &str, message: &str) -> Result<String> {
        let mut url = url::Url::parse("https://web.whatsapp.com/send")
            .map_err(|e| CourierError::transport(format!("chat url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("phone", phone)
            .append_pair("text", message);
        Ok(url.to_string())
    }

    /// The fallible send path; `send()` turns any error into `false`.
    async fn deliver(&self, phone: &str, message: &str) -> Result<()> {
        let phone = Self::normalize_phone(phone, &self.cfg.country_code);
        tracing::info!("📱 Opening chat with +{phone}");
        self.driver.navigate(&Self::chat_url(&phone, message)?).await?;

        let send_timeout = std::time::Duration::from_secs(self.cfg.send_timeout_secs);
        let button = self
            .driver
            .wait_for_element(SEND_BUTTON_XPATH, send_timeout)
            .await;

        let button = match button {
            Ok(b) => b,
            Err(e) => {
                // Distinguish a bad number from a slow page.
                if self.driver.find_element(INVALID_NUMBER_XPATH).await.is_ok() {
                    return Err(CourierError::transport(format!(
                        "invalid phone number: +{phone}"
                    )));
                }
                return Err(e);
            }
        };

        self.driver.click(&button).await?;

        // The delivery check-mark is best-effort: the message usually
        // went out even when it never shows up in time.
        match self
            .driver
            .wait_for_element(DELIVERY_CHECK_XPATH, std::time::Duration::from_secs(10))
            .await
        {
            Ok(_) => tracing::info!("✅ Delivery check-mark observed for +{phone}"),
            Err(_) => {
                tracing::warn!("⚠️ Message to +{phone} sent but delivery was not verified")
            }
        }
        Ok(())
    }

    /// Best-effort timestamped screenshot for post-mortems.
    async fn capture_failure(&self) {
        let dir = shellexpand::tilde(&self.cfg.screenshot_dir).to_string();
        if std::fs::create_dir_all(&dir).is_err() {
            return;
        }
        match self.driver.screenshot().await {
            Ok(png) => {
                let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
                let path = format!("{dir}/error_{stamp}.png");
                match std::fs::write(&path, png) {
                    Ok(()) => tracing::info!("📸 Failure screenshot saved to {path}"),
                    Err(e) => tracing::warn!("⚠️ Could not save screenshot: {e}"),
                }
            }
            Err(e) => tracing::debug!("Screenshot unavailable: {e}"),
        }
    }
}

#[async_trait]
impl Transport for WhatsAppWebTransport {
    fn name(&self) -> &str {
        "whatsapp-web"
    }

    async fn connect(&mut self) -> Result<()> {
        let profile = shellexpand::tilde(&self.cfg.profile_dir).to_string();
        std::fs::create_dir_all(&profile)?;

        let args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--start-maximized".to_string(),
            format!("--user-data-dir={profile}"),
        ];
        self.driver.start_session(&args).await?;
        self.driver.navigate("https://web.whatsapp.com").await?;

        tracing::info!(
            "🔑 Waiting up to {}s for the WhatsApp Web session (scan the QR code if prompted)",
            self.cfg.login_timeout_secs
        );
        let login_timeout = std::time::Duration::from_secs(self.cfg.login_timeout_secs);
        match self
            .driver
            .wait_for_element(CHAT_PANE_XPATH, login_timeout)
            .await
        {
            Ok(_) => {
                self.connected = true;
                tracing::info!("✅ WhatsApp Web session ready");
                Ok(())
            }
            Err(_) => {
                self.capture_failure().await;
                self.driver.end_session().await.ok();
                Err(CourierError::AuthFailed(
                    "timed out waiting for WhatsApp Web login".into(),
                ))
            }
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        self.driver.end_session().await?;
        tracing::info!("🛑 WhatsApp Web session closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send(&self, phone: &str, message: &str) -> bool {
        if !self.connected {
            tracing::error!("❌ Transport not connected — start the bot first");
            return false;
        }
        match self.deliver(phone, message).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("❌ Send to {phone} failed: {e}");
                self.capture_failure().await;
                false
            }
        }
    }
}
