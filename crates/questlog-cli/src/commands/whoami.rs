//! Whoami command implementation.

use anyhow::{Result, bail};
use clap::Args;

use crate::output;
use crate::session::Target;

#[derive(Args, Debug)]
pub struct WhoamiArgs {
    /// Print the identity as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(target: &Target, args: WhoamiArgs) -> Result<()> {
    let client = target.resume().await?;

    if !client.is_authenticated() {
        bail!("No active session. Run 'questlog login' first.");
    }

    match client.current_identity() {
        Some(identity) if args.json => output::json_pretty(&identity)?,
        Some(identity) => output::identity(&identity),
        None => output::warning("Signed in, but the server did not say as whom"),
    }

    Ok(())
}
