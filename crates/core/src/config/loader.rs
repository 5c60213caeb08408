use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// `LECTERN_ENGINE__WORKERS=4` overrides `[engine] workers`. Relative
/// `database.path` and `storage.data_dir` resolve against the file's
/// directory, so the service behaves the same whatever its working directory.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let mut config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("LECTERN_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    if let Some(base) = path.parent() {
        config.database.path = anchor(base, &config.database.path);
        config.storage.data_dir = anchor(base, &config.storage.data_dir);
    }

    Ok(config)
}

/// Load configuration from TOML string (useful for testing). Paths are kept as written.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
