use crate::config::TwilioConfig;
use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::info;

use super::Messenger;

/// Sends SMS through Twilio's Messages REST resource.
pub struct TwilioMessenger {
    client: Client,
    api_base: String,
    sid: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResource {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

impl TwilioMessenger {
    pub fn new(config: &TwilioConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            sid: config.sid.clone(),
            token: config.token.clone(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/Accounts/{}/Messages.json", self.api_base, self.sid)
    }
}

fn encode_form(from: &str, to: &str, body: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("From", from)
        .append_pair("To", to)
        .append_pair("Body", body)
        .finish()
}

#[async_trait]
impl Messenger for TwilioMessenger {
    async fn send(&self, from: &str, to: &str, body: &str) -> Result<()> {
        info!("Sending SMS notification to {}", to);

        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.sid, Some(&self.token))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(encode_form(from, to, body))
            .send()
            .await
            .map_err(|e| MonitorError::Delivery(format!("Twilio request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResource>(&text)
                .map(|e| match e.code {
                    Some(code) => format!("{} (code {})", e.message, code),
                    None => e.message,
                })
                .unwrap_or(text);
            return Err(MonitorError::Delivery(format!("Twilio returned {}: {}", status, detail)));
        }

        let msg: MessageResource = resp
            .json()
            .await
            .map_err(|e| MonitorError::Delivery(format!("unexpected Twilio response: {}", e)))?;
        info!("SMS queued: sid={} status={}", msg.sid, msg.status.as_deref().unwrap_or("unknown"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TwilioConfig {
        TwilioConfig {
            from_num: "+15550001111".into(),
            to_num: "+15550002222".into(),
            sid: "AC0123".into(),
            token: "tok".into(),
            api_base: "https://api.twilio.com/2010-04-01/".into(),
        }
    }

    #[test]
    fn test_messages_url() {
        let m = TwilioMessenger::new(&config());
        assert_eq!(
            m.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC0123/Messages.json"
        );
    }

    #[test]
    fn test_encode_form() {
        let form = encode_form("+15550001111", "+15550002222", "Good news!\n\n$219.99 & more");
        assert_eq!(
            form,
            "From=%2B15550001111&To=%2B15550002222&Body=Good+news%21%0A%0A%24219.99+%26+more"
        );
    }

    #[test]
    fn test_error_resource() {
        let e: ErrorResource =
            serde_json::from_str(r#"{"code":21211,"message":"Invalid 'To' Phone Number","status":400}"#)
                .unwrap();
        assert_eq!(e.code, Some(21211));
        assert_eq!(e.message, "Invalid 'To' Phone Number");
    }

    #[tokio::test]
    async fn test_unreachable_api_is_delivery_error() {
        let mut cfg = config();
        cfg.api_base = "http://127.0.0.1:9".into();
        let m = TwilioMessenger::new(&cfg);
        let err = m.send("+1", "+2", "hi").await.unwrap_err();
        assert!(matches!(err, MonitorError::Delivery(_)));
    }
}
