use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelsyncConfig {
    pub database: Option<String>,
    pub models: Option<String>,
    pub fixtures: Option<String>,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("modelsync.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from("modelsync.db")
}

pub fn default_models_path() -> PathBuf {
    PathBuf::from("models.json")
}

pub fn default_fixtures_dir() -> PathBuf {
    PathBuf::from("fixtures")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<ModelsyncConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: ModelsyncConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &ModelsyncConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
