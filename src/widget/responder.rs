use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Produces the bot's reply to a user message.
#[async_trait]
pub trait ResponseProvider: Send + Sync {
    async fn respond(&self, text: &str) -> String;
}

/// Stand-in backend: waits a random 1-2 s, then echoes the message.
#[derive(Debug, Clone)]
pub struct DemoResponder {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for DemoResponder {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(2000),
        }
    }
}

pub fn demo_reply(text: &str) -> String {
    format!("I received: \"{text}\". This is a demo response from the widget.")
}

#[async_trait]
impl ResponseProvider for DemoResponder {
    async fn respond(&self, text: &str) -> String {
        let min = self.min_delay.as_millis() as u64;
        let max = (self.max_delay.as_millis() as u64).max(min);
        let delay = rand::rng().random_range(min..=max);
        sleep(Duration::from_millis(delay)).await;
        demo_reply(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn demo_responder_waits_then_echoes() {
        let responder = DemoResponder::default();
        let started = tokio::time::Instant::now();
        let reply = responder.respond("hi").await;
        let waited = started.elapsed();
        assert_eq!(
            reply,
            "I received: \"hi\". This is a demo response from the widget."
        );
        assert!(waited >= Duration::from_millis(1000));
        assert!(waited <= Duration::from_millis(2001));
    }
}
