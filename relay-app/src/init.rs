//! Configuration scaffolding for `teamsrelay init`.
//!
//! Writes the config template without overwriting an existing local file.

use anyhow::Result;
use std::path::{Path, PathBuf};

const CONFIG_TEMPLATE: &str = include_str!("../../config-templates/teamsrelay.toml");

#[derive(Debug, Clone)]
pub struct InitReport {
    pub path: PathBuf,
    pub created: bool,
}

pub async fn initialize(path: Option<PathBuf>) -> Result<InitReport> {
    let path = path.unwrap_or_else(crate::config::default_config_path);
    initialize_at(&path).await
}

pub async fn initialize_at(path: &Path) -> Result<InitReport> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(InitReport {
            path: path.to_path_buf(),
            created: false,
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| anyhow::anyhow!("create config dir {}: {e}", parent.display()))?;
            }
            tokio::fs::write(path, CONFIG_TEMPLATE)
                .await
                .map_err(|e| anyhow::anyhow!("write config template {}: {e}", path.display()))?;
            Ok(InitReport {
                path: path.to_path_buf(),
                created: true,
            })
        }
        Err(err) => Err(anyhow::anyhow!(
            "inspect config path {}: {err}",
            path.display()
        )),
    }
}
