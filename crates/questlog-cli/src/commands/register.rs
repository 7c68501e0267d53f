//! Register command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use questlog_core::Registration;

use crate::output;
use crate::session::Target;

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Username for the new account
    pub username: String,

    /// Email address for the new account
    #[arg(long)]
    pub email: String,

    /// Account password
    #[arg(long, env = "QUESTLOG_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(target: &Target, args: RegisterArgs) -> Result<()> {
    let client = target.client()?;
    let registration = Registration::new(&args.username, &args.email, &args.password);

    eprintln!("{}", "Creating account...".dimmed());

    let identity = client
        .register(registration)
        .await
        .context("Failed to create account")?;

    output::success("Account created successfully");
    match identity {
        Some(identity) => output::identity(&identity),
        None => output::field("User", &args.username),
    }

    Ok(())
}
