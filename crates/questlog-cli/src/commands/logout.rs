//! Logout command implementation.

use anyhow::Result;
use clap::Args;

use crate::output;
use crate::session::Target;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(target: &Target, _args: LogoutArgs) -> Result<()> {
    let client = target.client()?;
    client.sign_out();

    output::success("Logged out");

    Ok(())
}
