//! Subcommand implementations.

pub mod login;
pub mod logout;
pub mod refresh;
pub mod register;
pub mod request;
pub mod whoami;

use anyhow::Result;

use crate::cli::{Cli, Commands};
use crate::session::Target;

pub async fn handle(cli: Cli) -> Result<()> {
    let target = Target {
        api: cli.api,
        session_file: cli.session_file,
    };

    match cli.command {
        Commands::Login(args) => login::run(&target, args).await,
        Commands::Register(args) => register::run(&target, args).await,
        Commands::Whoami(args) => whoami::run(&target, args).await,
        Commands::Refresh(args) => refresh::run(&target, args).await,
        Commands::Request(args) => request::run(&target, args).await,
        Commands::Logout(args) => logout::run(&target, args).await,
    }
}
