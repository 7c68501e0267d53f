//! Refresh command implementation.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;

use crate::output;
use crate::session::Target;

#[derive(Args, Debug)]
pub struct RefreshArgs {}

pub async fn run(target: &Target, _args: RefreshArgs) -> Result<()> {
    let client = target.client()?;

    if !client.credentials().restore() {
        bail!("No active session. Run 'questlog login' first.");
    }

    eprintln!("{}", "Refreshing session...".dimmed());

    client
        .refresh()
        .await
        .context("Failed to refresh session")?;

    output::success("Session refreshed successfully");
    if let Some(identity) = client.current_identity() {
        output::field("User", &identity.display_name);
    }

    Ok(())
}
