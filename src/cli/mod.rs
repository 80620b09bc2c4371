//! Command-line interface for the loyalty server.

mod commands;

use clap::{Parser, Subcommand};

/// Campus Loyalty - points, rewards and events for campus stores
#[derive(Parser)]
#[command(name = "campus-loyalty")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server (default)
    #[command(alias = "web")]
    Serve,

    /// Create a default config.toml in the working directory
    Init,

    /// Populate an empty database with demo users, events, promotions and transactions
    Seed {
        /// Password given to every demo account
        #[arg(long, default_value = "Password123!")]
        password: String,
    },

    /// Create a superuser, or promote an existing account
    CreateSuperuser {
        utorid: String,
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        password: String,
    },
}

pub use commands::*;
