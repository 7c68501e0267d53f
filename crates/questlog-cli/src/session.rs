//! Where the CLI keeps its session and how it builds a client around it.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use tracing::debug;

use questlog_core::ApiUrl;
use questlog_file::FileStorage;
use questlog_http::{Client, ClientConfig};

/// The API and session file a command runs against.
#[derive(Debug, Clone)]
pub struct Target {
    pub api: String,
    pub session_file: Option<PathBuf>,
}

impl Target {
    /// Build a client whose session is mirrored to the session file.
    pub fn client(&self) -> Result<Client> {
        let base_url = ApiUrl::new(&self.api).context("Invalid API URL")?;
        let path = self.session_path()?;
        debug!(path = %path.display(), "Using session file");

        let config = ClientConfig::new(base_url)
            .with_user_agent(format!("questlog/{}", env!("QUESTLOG_VERSION")))
            .with_timeout(Duration::from_secs(30));

        Client::new(config, Arc::new(FileStorage::new(path))).context("Failed to create client")
    }

    /// Build a client and pick up the stored session, if there is one.
    pub async fn resume(&self) -> Result<Client> {
        let client = self.client()?;
        client.resume().await;
        Ok(client)
    }

    fn session_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.session_file {
            return Ok(path.clone());
        }

        let dirs = ProjectDirs::from("", "", "questlog")
            .context("Could not determine data directory")?;
        let data_dir = dirs.data_dir();
        fs::create_dir_all(data_dir).context("Failed to create data directory")?;

        Ok(data_dir.join("session.json"))
    }
}
