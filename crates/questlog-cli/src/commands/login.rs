//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use questlog_core::Credentials;

use crate::output;
use crate::session::Target;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Username or email
    #[arg(long)]
    pub identifier: String,

    /// Account password
    #[arg(long, env = "QUESTLOG_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(target: &Target, args: LoginArgs) -> Result<()> {
    let client = target.client()?;
    let credentials = Credentials::new(&args.identifier, &args.password);

    eprintln!("{}", "Logging in...".dimmed());

    let identity = client
        .login(credentials)
        .await
        .context("Failed to login")?;

    output::success("Logged in successfully");
    println!();
    match identity {
        Some(identity) => output::identity(&identity),
        None => output::field("User", &args.identifier),
    }
    output::field("API", &client.config().base_url.to_string());

    Ok(())
}
