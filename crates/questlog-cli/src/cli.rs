//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{login, logout, refresh, register, request, whoami};

/// Command-line client for the questlog API.
#[derive(Parser, Debug)]
#[command(name = "questlog")]
#[command(author, version = env!("QUESTLOG_VERSION"), about, long_about = None)]
pub struct Cli {
    /// API base URL
    #[arg(
        long,
        env = "QUESTLOG_API",
        default_value = "http://localhost:8080/api",
        global = true
    )]
    pub api: String,

    /// Session file (defaults to the platform data directory)
    #[arg(long, env = "QUESTLOG_SESSION_FILE", global = true)]
    pub session_file: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with a username or email and password
    Login(login::LoginArgs),

    /// Create an account and log in with it
    Register(register::RegisterArgs),

    /// Display the signed-in identity
    Whoami(whoami::WhoamiArgs),

    /// Renew the session credentials
    Refresh(refresh::RefreshArgs),

    /// Send an authenticated call and print the response
    Request(request::RequestArgs),

    /// End the session and forget the stored credentials
    Logout(logout::LogoutArgs),
}
