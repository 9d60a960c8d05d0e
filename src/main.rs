use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use teloxide::dptree;

use chistobot::booking::wizard::WizardConfig;
use chistobot::cli::{Cli, Commands};
use chistobot::core::{config, init_logger, log_startup_configuration};
use chistobot::storage::db;
use chistobot::telegram::{handle_command, handle_menu_callback, run_webapp_server, Bot, BotContext, Command};

/// Main entry point.
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    // Global panic handler: log the panic instead of dying silently
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    init_logger(&config::LOG_FILE_PATH)?;
    log_startup_configuration();

    match cli.command {
        Some(Commands::Serve) => {
            log::info!("Running Mini App API server only");
            run_server().await
        }
        Some(Commands::Seed { user_id }) => seed_demo(user_id),
        Some(Commands::Run) | None => {
            log::info!("Running bot with Mini App API server");
            run_bot().await
        }
    }
}

async fn run_server() -> Result<()> {
    let pool = Arc::new(db::create_pool(&config::DATABASE_PATH)?);
    run_webapp_server(
        *config::WEBAPP_PORT,
        pool,
        config::BOT_TOKEN.clone(),
        chistobot::booking::AvailabilityRules::from_config(),
    )
    .await
}

fn seed_demo(user_id: i64) -> Result<()> {
    let pool = db::create_pool(&config::DATABASE_PATH)?;
    let conn = db::get_connection(&pool)?;
    let now = chrono::Local::now().naive_local();
    db::seed_demo_cleanings(&conn, user_id, now)?;
    log::info!("Seeded demo cleanings for user {}", user_id);
    Ok(())
}

async fn run_bot() -> Result<()> {
    let pool = Arc::new(db::create_pool(&config::DATABASE_PATH)?);
    let bot = Bot::new(config::BOT_TOKEN.clone());

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    // The Mini App API shares the process and the database pool
    let webapp_pool = Arc::clone(&pool);
    tokio::spawn(async move {
        if let Err(e) = run_webapp_server(
            *config::WEBAPP_PORT,
            webapp_pool,
            config::BOT_TOKEN.clone(),
            chistobot::booking::AvailabilityRules::from_config(),
        )
        .await
        {
            log::error!("Mini App API server failed: {}", e);
        }
    });

    let ctx = Arc::new(BotContext::new(pool, WizardConfig::default()));

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_callback_query().endpoint(handle_menu_callback));

    log::info!("Starting bot dispatcher");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
