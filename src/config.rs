//! User configuration for the `twirl` command.
//!
//! Defaults come from `~/.config/twirl/config.yaml`; every key is optional.
//!
//! ```yaml
//! title: "Deploying..."
//! type: mini-dot
//! spinner_style: magenta
//! title_style: bold
//! accessible: false
//! show_output: true
//! ```

use anyhow::{Context, Result};
use console::Style;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::spinner::SpinnerType;

/// Environment variable that forces accessible mode when non-empty.
pub const ACCESSIBLE_ENV: &str = "ACCESSIBLE";

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub spinner_type: Option<SpinnerType>,
    /// Dotted console style for the glyphs, e.g. `cyan.bold`.
    pub spinner_style: Option<String>,
    /// Dotted console style for the title.
    pub title_style: Option<String>,
    pub accessible: Option<bool>,
    pub show_output: Option<bool>,
}

impl Config {
    /// Load the config from `path`, or from the global config file when no
    /// path is given. A missing global file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match global_config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    debug!("config:no global config file");
                    return Ok(Self::default());
                }
            },
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        debug!(path = %path.display(), "config:loaded");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        // serde_yaml rejects an empty document for a struct
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Whether accessible mode is on, taking the environment into account.
    pub fn accessible(&self) -> bool {
        resolve_accessible(
            self.accessible,
            std::env::var(ACCESSIBLE_ENV).ok().as_deref(),
        )
    }

    pub fn spinner_style(&self) -> Option<Style> {
        self.spinner_style.as_deref().map(parse_style)
    }

    pub fn title_style(&self) -> Option<Style> {
        self.title_style.as_deref().map(parse_style)
    }
}

/// A non-empty environment value turns accessible mode on regardless of the
/// config file.
fn resolve_accessible(configured: Option<bool>, env: Option<&str>) -> bool {
    match env {
        Some(value) if !value.is_empty() => true,
        _ => configured.unwrap_or(false),
    }
}

/// Parse a dotted console style (`red.bold.on_black`) for stderr output.
pub fn parse_style(dotted: &str) -> Style {
    Style::from_dotted_str(dotted).for_stderr()
}

/// Get the path to the global config file.
/// Prefers existing .yml file to avoid shadowing, otherwise defaults to .yaml.
fn global_config_path() -> Option<PathBuf> {
    let home = home::home_dir()?;
    let yaml = home.join(".config/twirl/config.yaml");
    let yml = home.join(".config/twirl/config.yml");

    if yml.exists() && !yaml.exists() {
        Some(yml)
    } else {
        Some(yaml)
    }
}
