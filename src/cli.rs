mod bot;
mod burrow;
mod daemon;
mod heartbeat;
mod notifications;
mod octopus;
mod run;

use clap::{Parser, Subcommand};

use crate::{
    cli::{burrow::BurrowArgs, daemon::DaemonArgs, run::RunArgs},
    prelude::*,
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub async fn run(self) -> Result {
        match self.command {
            Command::Run(args) => args.run().await,
            Command::Daemon(args) => args.run().await,
            Command::Burrow(args) => args.run().await,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: compare today's costs and switch to the cheapest tariff when it pays off.
    #[clap(name = "run")]
    Run(Box<RunArgs>),

    /// Keep running the main command every day.
    #[clap(name = "daemon")]
    Daemon(Box<DaemonArgs>),

    /// Development tools.
    #[clap(name = "burrow")]
    Burrow(Box<BurrowArgs>),
}
