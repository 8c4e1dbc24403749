pub mod prompt;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "visapal", about = "Student-visa signup intake & lead analytics")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API (signup endpoint and admin dashboard)
    Serve,
    /// Register a lead; missing fields are prompted for
    Signup {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        university: Option<String>,
        #[arg(long)]
        plan: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    Leads,
    Stats,
    Report {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Doctor,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}
