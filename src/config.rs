use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use tracing::{debug, warn};

/// Client block sent to the internal player endpoint.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PlayerClient {
    pub name: String,
    pub version: String,
    pub hl: String,
    pub gl: String,
}

impl Default for PlayerClient {
    fn default() -> Self {
        Self { name: "ANDROID".into(), version: "19.09.37".into(), hl: "en".into(), gl: "US".into() }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub bind: SocketAddr,
    /// Tried strictly in this order.
    pub invidious_instances: Vec<String>,
    pub itunes_base: String,
    pub youtube_base: String,
    pub timeout_ms: u64,
    pub duration_ceiling_secs: u64,
    pub user_agent: String,
    pub player_client: PlayerClient,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            invidious_instances: [
                "https://invidious.snopyta.org",
                "https://invidious.tiekoetter.com",
                "https://inv.nadeko.net",
                "https://invidious.nerdvpn.de",
                "https://invidious.privacydev.net",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            itunes_base: "https://itunes.apple.com".into(),
            youtube_base: "https://www.youtube.com".into(),
            timeout_ms: 8000,
            duration_ceiling_secs: 1200,
            user_agent: "Mozilla/5.0".into(),
            player_client: PlayerClient::default(),
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }

    /// Defaults, then the TOML file, then environment overrides.
    /// An explicit path must exist; the per-user default path is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut cfg = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        cfg.apply_overrides(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config: {}", path.display()))?;
        let cfg = toml::from_str(&text).with_context(|| format!("parsing config: {}", path.display()))?;
        debug!(path = %path.display(), "loaded config file");
        Ok(cfg)
    }

    pub fn apply_overrides<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = get("PORT").filter(|s| !s.trim().is_empty()) {
            match port.trim().parse::<u16>() {
                Ok(port) => self.bind.set_port(port),
                Err(_) => warn!(%port, default = self.bind.port(), "ignoring unparseable PORT"),
            }
        }
        if let Some(ms) = get("OBLIVION_TIMEOUT_MS") {
            self.timeout_ms = ms.trim().parse().with_context(|| format!("invalid OBLIVION_TIMEOUT_MS: {ms}"))?;
        }
        if let Some(c) = get("OBLIVION_DURATION_CEILING") {
            self.duration_ceiling_secs = c.trim().parse().with_context(|| format!("invalid OBLIVION_DURATION_CEILING: {c}"))?;
        }
        if let Some(list) = get("OBLIVION_INVIDIOUS_INSTANCES") {
            self.invidious_instances = list.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "oblivion", "oblivion").map(|p| p.config_dir().join("config.toml"))
}
