use cabletrace_engine::SynthesisSettings;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path};
use tokio::fs;
use tracing::warn;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct KernelConfig {
    pub listen: SocketAddr,
    pub storage: StorageConf,
    pub synthesis: SynthesisSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    Json,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConf {
    pub kind: StorageKind,
    pub path: String, // ignoré en mode memory
}

impl Default for StorageConf {
    fn default() -> Self {
        Self { kind: StorageKind::Json, path: "./data/cabletrace.json".into() }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            storage: StorageConf::default(),
            synthesis: SynthesisSettings::default(),
        }
    }
}

/// Texte YAML → config ; vide = défauts
pub fn parse_config(txt: &str) -> Result<KernelConfig, serde_yaml::Error> {
    if txt.trim().is_empty() {
        return Ok(KernelConfig::default());
    }
    serde_yaml::from_str(txt)
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("CABLETRACE_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        parse_config(&txt).unwrap_or_else(|e| {
            warn!(%path, error = %e, "invalid config, using defaults");
            KernelConfig::default()
        })
    } else {
        warn!(%path, "no config file, using defaults");
        KernelConfig::default()
    }
}
