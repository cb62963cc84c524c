pub mod twilio;

use crate::error::Result;
use crate::models::TargetSpec;
use async_trait::async_trait;

pub use self::twilio::TwilioMessenger;

pub const PREAMBLE: &str = "Good news everyone!";

/// Outbound text message delivery.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Deliver `body` from `from` to `to`. Failures surface as `MonitorError::Delivery`.
    async fn send(&self, from: &str, to: &str, body: &str) -> Result<()>;
}

/// SMS body: preamble, the price line and the product link.
pub fn compose_message(target: &TargetSpec, price: f64, link: &str) -> String {
    format!("{}\n\n{}\n\n{}", PREAMBLE, target.price_message(price), link)
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::error::MonitorError;
    use std::sync::Mutex;

    /// Records every message; optionally fails them all.
    #[derive(Default)]
    pub struct FakeMessenger {
        pub sent: Mutex<Vec<(String, String, String)>>,
        pub fail: bool,
    }

    impl FakeMessenger {
        pub fn failing() -> Self {
            Self { fail: true, ..Default::default() }
        }

        pub fn sent(&self) -> Vec<(String, String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Messenger for FakeMessenger {
        async fn send(&self, from: &str, to: &str, body: &str) -> Result<()> {
            if self.fail {
                return Err(MonitorError::Delivery("carrier rejected message".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((from.to_string(), to.to_string(), body.to_string()));
            Ok(())
        }
    }
}
