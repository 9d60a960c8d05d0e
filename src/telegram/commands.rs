//! Chat command handlers.

use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::storage::db;
use crate::telegram::menu::{show_cleanings, show_main_menu, BotContext};
use crate::telegram::Bot;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Команды Чистоклин:")]
pub enum Command {
    #[command(description = "главное меню")]
    Start,
    #[command(description = "главное меню")]
    Menu,
    #[command(description = "мои уборки")]
    Cleanings,
    #[command(description = "чат с поддержкой")]
    Support,
}

pub async fn handle_command(bot: Bot, msg: Message, cmd: Command, ctx: Arc<BotContext>) -> ResponseResult<()> {
    match cmd {
        Command::Start => {
            if let Some(user) = msg.from.as_ref() {
                match db::get_connection(&ctx.db_pool) {
                    Ok(conn) => {
                        if let Err(e) = db::upsert_user(
                            &conn,
                            user.id.0 as i64,
                            user.username.as_deref(),
                            Some(user.first_name.as_str()),
                        ) {
                            log::error!("Failed to upsert user {}: {}", user.id, e);
                        }
                    }
                    Err(e) => log::error!("Failed to get db connection: {}", e),
                }
            }
            show_main_menu(&bot, msg.chat.id, ctx).await?;
        }
        Command::Menu => {
            show_main_menu(&bot, msg.chat.id, ctx).await?;
        }
        Command::Cleanings => {
            show_cleanings(&bot, msg.chat.id, ctx).await?;
        }
        Command::Support => {
            bot.send_message(msg.chat.id, "💬 Напишите нам: @chistoclean_support").await?;
        }
    }
    Ok(())
}
