use reqwest::Client;
use serde::Deserialize;

use crate::config::MessagingSettings;
use crate::domain::repository::MessagingPort;
use crate::error::BookingServiceError;
use crate::infra::http::{json, send};

const PROVIDER: &str = "messaging";
const API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[derive(Clone)]
pub struct TwilioClient {
    pub http: Client,
    pub settings: Option<MessagingSettings>,
}

/// Address on the WhatsApp channel.
pub fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with("whatsapp:") {
        number.to_owned()
    } else {
        format!("whatsapp:{number}")
    }
}

#[derive(Deserialize)]
struct SentMessage {
    sid: String,
}

impl MessagingPort for TwilioClient {
    fn is_configured(&self) -> bool {
        self.settings.is_some()
    }

    async fn send(
        &self,
        to: &str,
        body: &str,
        media_url: Option<&str>,
    ) -> Result<String, BookingServiceError> {
        let settings = self
            .settings
            .as_ref()
            .ok_or(BookingServiceError::NotConfigured("messaging provider"))?;

        let to = whatsapp_address(to);
        let from = whatsapp_address(&settings.from);
        let mut form = vec![("To", to.as_str()), ("From", from.as_str()), ("Body", body)];
        if let Some(url) = media_url {
            form.push(("MediaUrl", url));
        }

        let request = self
            .http
            .post(format!(
                "{API_BASE}/Accounts/{}/Messages.json",
                settings.account_sid
            ))
            .basic_auth(&settings.account_sid, Some(&settings.auth_token))
            .form(&form);
        let sent: SentMessage = json(PROVIDER, send(PROVIDER, request).await?).await?;
        Ok(sent.sid)
    }
}
