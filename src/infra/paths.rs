// src/infra/paths.rs — XDG-compliant path management
//
// All paths respect the TRIPWISE_HOME environment variable for isolation.
// When TRIPWISE_HOME is set, config, data and cache live under that directory.

use directories::ProjectDirs;
use std::path::PathBuf;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "tripwise")
}

fn tripwise_home() -> Option<PathBuf> {
    std::env::var_os("TRIPWISE_HOME").map(PathBuf::from)
}

/// Configuration directory: $TRIPWISE_HOME/ or the platform config dir.
pub fn config_dir() -> PathBuf {
    if let Some(home) = tripwise_home() {
        return home;
    }
    project_dirs()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".tripwise"))
}

/// Data directory: $TRIPWISE_HOME/data/ or the platform local data dir.
pub fn data_dir() -> PathBuf {
    if let Some(home) = tripwise_home() {
        return home.join("data");
    }
    project_dirs()
        .map(|d| d.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".tripwise/data"))
}

/// Cache directory: $TRIPWISE_HOME/cache/ or the platform cache dir.
pub fn cache_dir() -> PathBuf {
    if let Some(home) = tripwise_home() {
        return home.join("cache");
    }
    project_dirs()
        .map(|d| d.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".tripwise/cache"))
}

/// Conversation database
pub fn db_path() -> PathBuf {
    data_dir().join("tripwise.db")
}

/// Persisted intent centroids
pub fn intent_cache_path() -> PathBuf {
    cache_dir().join("intent_embeddings.json")
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure all required directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    for dir in [config_dir(), data_dir(), cache_dir()] {
        tokio::fs::create_dir_all(&dir).await?;
    }
    Ok(())
}
