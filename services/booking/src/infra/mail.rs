use reqwest::Client;
use serde::Serialize;

use crate::config::MailSettings;
use crate::domain::repository::MailPort;
use crate::error::BookingServiceError;
use crate::infra::http::send;

const PROVIDER: &str = "mail";

/// Transactional e-mail through an HTTP relay accepting a JSON envelope.
#[derive(Clone)]
pub struct MailRelayClient {
    pub http: Client,
    pub settings: Option<MailSettings>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl MailPort for MailRelayClient {
    fn is_configured(&self) -> bool {
        self.settings.is_some()
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), BookingServiceError> {
        let settings = self
            .settings
            .as_ref()
            .ok_or(BookingServiceError::NotConfigured("mail relay"))?;
        let request = self
            .http
            .post(&settings.relay_url)
            .bearer_auth(&settings.api_key)
            .json(&Envelope {
                from: &settings.from,
                to,
                subject,
                text: body,
            });
        send(PROVIDER, request).await?;
        Ok(())
    }
}
