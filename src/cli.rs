use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chistobot")]
#[command(author, version, about = "Telegram bot and Mini App backend for subscription home cleaning", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot together with the Mini App API server
    Run,

    /// Run only the Mini App API server, without the bot
    Serve,

    /// Seed demo cleanings for a user into the local database
    Seed {
        /// Telegram user id to seed cleanings for
        #[arg(short, long)]
        user_id: i64,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
