//! The host bridge: everything the hosting application provides to the
//! wizard — user identity, a one-way outbound data channel, confirmation
//! and alert prompts, advisory haptics.
//!
//! One implementation is selected at startup and passed around as a trait
//! object; call sites never branch on bridge availability. When no real
//! host is present, [`NoopBridge`] stands in with plain-confirm semantics.

use async_trait::async_trait;
use serde::Serialize;
use teloxide::prelude::*;

use crate::backend::types::TariffId;
use crate::core::AppResult;

/// Haptic feedback kinds. Advisory only, never required for correctness.
#[derive(Debug, Clone, Copy)]
pub enum HapticKind {
    Light,
    Medium,
    Success,
}

/// JSON payloads sent through the one-way outbound channel.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BridgePayload {
    ScheduleCleaning {
        /// Combined local instant, ISO formatted
        date: String,
        time: String,
        tariff: TariffId,
    },
    CancelCleaning {
        cleaning_id: String,
    },
    OpenSupportChat,
}

#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Identity of the user on whose behalf the wizard runs, if the host
    /// knows it.
    fn user_id(&self) -> Option<i64>;

    /// One-way send to the hosting application.
    async fn send_payload(&self, payload: &BridgePayload) -> AppResult<()>;

    /// Blocking yes/no prompt. `Ok(false)` means the user declined.
    async fn request_confirmation(&self, text: &str) -> AppResult<bool>;

    /// Informational prompt.
    async fn alert(&self, text: &str) -> AppResult<()>;

    /// Advisory haptic tick; the default does nothing.
    fn haptic(&self, _kind: HapticKind) {}
}

/// Fallback bridge for environments without a host: payloads are logged,
/// prompts resolve like the browser-native equivalents.
#[derive(Debug, Clone)]
pub struct NoopBridge {
    user_id: Option<i64>,
    /// What `request_confirmation` resolves to
    auto_confirm: bool,
}

impl NoopBridge {
    pub fn new(user_id: Option<i64>) -> Self {
        Self {
            user_id,
            auto_confirm: true,
        }
    }

    pub fn declining(user_id: Option<i64>) -> Self {
        Self {
            user_id,
            auto_confirm: false,
        }
    }
}

#[async_trait]
impl HostBridge for NoopBridge {
    fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    async fn send_payload(&self, payload: &BridgePayload) -> AppResult<()> {
        log::info!("Bridge payload (no host attached): {}", serde_json::to_string(payload)?);
        Ok(())
    }

    async fn request_confirmation(&self, text: &str) -> AppResult<bool> {
        log::debug!("Bridge confirmation '{}' -> {}", text, self.auto_confirm);
        Ok(self.auto_confirm)
    }

    async fn alert(&self, text: &str) -> AppResult<()> {
        log::info!("Bridge alert: {}", text);
        Ok(())
    }
}

/// Bridge implementation for the Telegram chat surface.
///
/// The chat UI gathers confirmations itself (two-tap inline keyboards), so
/// `request_confirmation` resolves to true here; alerts become plain chat
/// messages. Outbound payloads are logged — the hosting application is this
/// very bot, there is nowhere further to send them.
#[derive(Clone)]
pub struct TelegramBridge {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramBridge {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl HostBridge for TelegramBridge {
    fn user_id(&self) -> Option<i64> {
        Some(self.chat_id.0)
    }

    async fn send_payload(&self, payload: &BridgePayload) -> AppResult<()> {
        log::info!("Bridge payload for chat {}: {}", self.chat_id, serde_json::to_string(payload)?);
        Ok(())
    }

    async fn request_confirmation(&self, _text: &str) -> AppResult<bool> {
        Ok(true)
    }

    async fn alert(&self, text: &str) -> AppResult<()> {
        self.bot.send_message(self.chat_id, text).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_payload_wire_format_matches_mini_app_actions() {
        let schedule = BridgePayload::ScheduleCleaning {
            date: "2026-09-01T10:00:00".to_string(),
            time: "10:00".to_string(),
            tariff: TariffId::Standard,
        };
        let json = serde_json::to_value(&schedule).unwrap();
        assert_eq!(json["action"], "schedule_cleaning");
        assert_eq!(json["tariff"], "standard");

        let cancel = BridgePayload::CancelCleaning {
            cleaning_id: "c-1".to_string(),
        };
        let json = serde_json::to_value(&cancel).unwrap();
        assert_eq!(json["action"], "cancel_cleaning");

        let support = serde_json::to_value(&BridgePayload::OpenSupportChat).unwrap();
        assert_eq!(support["action"], "open_support_chat");
    }

    #[tokio::test]
    async fn test_noop_bridge_confirmation_modes() {
        let yes = NoopBridge::new(Some(1));
        assert!(yes.request_confirmation("?").await.unwrap());

        let no = NoopBridge::declining(Some(1));
        assert!(!no.request_confirmation("?").await.unwrap());
    }
}
