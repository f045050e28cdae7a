use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct Config {
    /// Days before a pending conversation-deletion request lapses.
    pub deletion_request_ttl_days: i64,
    /// Inactivity window after the last keystroke before stop_typing fires.
    pub typing_stop_debounce: Duration,
    /// How long a typing indicator stays lit without a fresh typing event.
    pub typing_auto_clear: Duration,
    pub max_message_length: usize,
    pub max_post_length: usize,
    pub event_bus_capacity: usize,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenv().ok();
        let deletion_request_ttl_days = env::var("DELETION_REQUEST_TTL_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(7);
        let typing_stop_debounce_ms: u64 = env::var("TYPING_STOP_DEBOUNCE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2_000);
        let typing_auto_clear_ms: u64 = env::var("TYPING_AUTO_CLEAR_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3_000);
        let max_message_length = env::var("MAX_MESSAGE_LENGTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(500);
        let max_post_length = env::var("MAX_POST_LENGTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(500);
        let event_bus_capacity = env::var("EVENT_BUS_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256);

        let config = Self {
            deletion_request_ttl_days,
            typing_stop_debounce: Duration::from_millis(typing_stop_debounce_ms),
            typing_auto_clear: Duration::from_millis(typing_auto_clear_ms),
            max_message_length,
            max_post_length,
            event_bus_capacity,
        };
        config.validate()?;
        Ok(config)
    }

    /// The auto-clear window must outlast the stop debounce, otherwise a
    /// subscriber clears the indicator before the sender's stop_typing can
    /// arrive and the indicator flickers on every pause.
    pub fn validate(&self) -> AppResult<()> {
        if self.typing_auto_clear < self.typing_stop_debounce {
            return Err(AppError::Config(
                "TYPING_AUTO_CLEAR_MS must be >= TYPING_STOP_DEBOUNCE_MS".into(),
            ));
        }
        if self.deletion_request_ttl_days < 1 {
            return Err(AppError::Config(
                "DELETION_REQUEST_TTL_DAYS must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn test_defaults() -> Self {
        Self {
            deletion_request_ttl_days: 7,
            typing_stop_debounce: Duration::from_millis(2_000),
            typing_auto_clear: Duration::from_millis(3_000),
            max_message_length: 500,
            max_post_length: 500,
            event_bus_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::test_defaults();
        assert!(config.validate().is_ok());
        assert_eq!(config.deletion_request_ttl_days, 7);
        assert_eq!(config.typing_stop_debounce, Duration::from_secs(2));
        assert_eq!(config.typing_auto_clear, Duration::from_secs(3));
    }

    #[test]
    fn rejects_auto_clear_shorter_than_debounce() {
        let config = Config {
            typing_auto_clear: Duration::from_millis(1_000),
            ..Config::test_defaults()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
