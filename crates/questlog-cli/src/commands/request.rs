//! Request command implementation.

use anyhow::{Context, Result, anyhow};
use clap::Args;

use questlog_http::{Method, RequestOptions};

use crate::output;
use crate::session::Target;

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    pub method: String,

    /// Path relative to the API base URL (e.g., /campaigns)
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub data: Option<String>,

    /// Extra header as NAME:VALUE (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,
}

pub async fn run(target: &Target, args: RequestArgs) -> Result<()> {
    let method: Method = args
        .method
        .to_uppercase()
        .parse()
        .with_context(|| format!("Invalid method: {}", args.method))?;

    let mut options = RequestOptions::new(method);

    if let Some(data) = &args.data {
        let body: serde_json::Value =
            serde_json::from_str(data).context("--data is not valid JSON")?;
        options = options.json(&body)?;
    }

    for raw in &args.headers {
        let (name, value) = raw
            .split_once(':')
            .ok_or_else(|| anyhow!("Invalid header (expected NAME:VALUE): {}", raw))?;
        options = options.header(name.trim(), value.trim())?;
    }

    let client = target.resume().await?;

    let body = client.request(&args.path, options).await.map_err(|e| {
        if e.requires_login() {
            anyhow!(e).context("Session expired. Run 'questlog login' again.")
        } else {
            anyhow!(e).context("Request failed")
        }
    })?;

    if let Some(body) = body {
        output::json_pretty(&body)?;
    }

    Ok(())
}
