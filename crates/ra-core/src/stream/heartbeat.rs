use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::Result;

/// Liveness file for external health checks.
///
/// Holds a single epoch-seconds value, overwritten on every keep-alive.
#[derive(Clone, Debug)]
pub struct Heartbeat {
    path: PathBuf,
}

impl Heartbeat {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn beat(&self) -> Result<()> {
        let now = Utc::now().timestamp();
        tokio::fs::write(&self.path, now.to_string()).await?;
        Ok(())
    }
}
