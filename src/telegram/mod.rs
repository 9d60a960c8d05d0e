//! Telegram integration: the chat surface and the Mini App API.

pub mod commands;
pub mod menu;
pub mod webapp;
pub mod webapp_auth;

pub type Bot = teloxide::Bot;

/// Shorthand for an inline keyboard callback button.
pub fn cb(
    text: impl Into<String>,
    data: impl Into<String>,
) -> teloxide::types::InlineKeyboardButton {
    teloxide::types::InlineKeyboardButton::callback(text.into(), data.into())
}

// Re-exports for convenience
pub use commands::{handle_command, Command};
pub use menu::{handle_menu_callback, show_main_menu, BotContext};
pub use webapp::{create_webapp_router, run_webapp_server};
