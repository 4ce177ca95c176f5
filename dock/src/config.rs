//! Author identity stored in `.dock/config.toml`.

use anyhow::{Context, Result};
use dock_core::{CONFIG_FILE, Signature};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Contents of `.dock/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Config {
    fn path(dock_dir: &Path) -> PathBuf {
        dock_dir.join(CONFIG_FILE)
    }

    /// Read the config; a missing file is an empty config.
    pub fn load(dock_dir: &Path) -> Result<Self> {
        let path = Self::path(dock_dir);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self, dock_dir: &Path) -> Result<()> {
        let path = Self::path(dock_dir);
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, format!("# config.toml\n{}", content))
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Overlay the values that were given.
    pub fn update(&mut self, name: Option<String>, email: Option<String>) {
        if name.is_some() {
            self.name = name;
        }
        if email.is_some() {
            self.email = email;
        }
    }

    /// The identity used for new starlogs.
    pub fn signature(&self) -> Result<Signature> {
        match (&self.name, &self.email) {
            (Some(name), Some(email)) => Ok(Signature::new(name.as_str(), email.as_str())),
            _ => anyhow::bail!(
                "Author identity is not configured. Run `dock config --name <NAME> --email <EMAIL>`"
            ),
        }
    }
}
