// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),
}

/// Search order for `<app>.toml`: current directory, XDG config dir, /etc.
pub fn config_search_paths(app: &str) -> Vec<PathBuf> {
    let file = format!("{}.toml", app);
    let mut paths = vec![PathBuf::from(&file)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(app).join(&file));
    }
    paths.push(PathBuf::from("/etc").join(app).join(&file));
    paths
}

/// Deserialize the `[key]` table of `content`, or `None` if it is absent.
fn parse_section<T: DeserializeOwned>(
    path: &Path,
    content: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let parse_err =
        |e: &dyn std::fmt::Display| ConfigError::ParseError(path.to_path_buf(), e.to_string());

    let mut table: toml::Table = toml::from_str(content).map_err(|e| parse_err(&e))?;
    let Some(section) = table.remove(key) else {
        return Ok(None);
    };
    section.try_into::<T>().map(Some).map_err(|e| parse_err(&e))
}

fn load_section_from_file<T: DeserializeOwned>(
    path: &Path,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
    parse_section(path, &content, key)
}

/// A configuration struct stored as one section of `<app>.toml`.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    /// Application name; also the file stem searched for.
    fn app_name() -> &'static str;

    /// Section key inside the file. Defaults to the application name.
    fn section_key() -> &'static str {
        Self::app_name()
    }

    /// Load the section from a specific file. A file without the section is
    /// an error.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        load_section_from_file::<Self>(path, Self::section_key())?.ok_or_else(|| {
            ConfigError::ParseError(
                path.to_path_buf(),
                format!("missing [{}] section", Self::section_key()),
            )
        })
    }

    /// Load the first default-path file that carries the section, or
    /// `(Default::default(), None)` when there is none.
    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in config_search_paths(Self::app_name()) {
            if path.exists() {
                if let Some(cfg) = load_section_from_file::<Self>(&path, Self::section_key())? {
                    return Ok((cfg, Some(path)));
                }
            }
        }
        Ok((Self::default(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Sample {
        name: String,
        port: u16,
    }

    impl ConfigFile for Sample {
        fn app_name() -> &'static str {
            "sample-app"
        }
    }

    fn write_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_search_paths() {
        let paths = config_search_paths("aprs-node");
        assert_eq!(paths.first().unwrap(), &PathBuf::from("aprs-node.toml"));
        assert_eq!(
            paths.last().unwrap(),
            &PathBuf::from("/etc/aprs-node/aprs-node.toml")
        );
    }

    #[test]
    fn test_load_section_with_defaults() {
        let file = write_file("[other]\nx = 1\n\n[sample-app]\nport = 14580\n");
        let cfg = Sample::load_from_file(file.path()).unwrap();
        assert_eq!(cfg.port, 14580);
        assert_eq!(cfg.name, "");
    }

    #[test]
    fn test_missing_section_is_error() {
        let file = write_file("[other]\nx = 1\n");
        let err = Sample::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("missing [sample-app] section"));
    }

    #[test]
    fn test_bad_toml_and_bad_types() {
        let file = write_file("[sample-app\n");
        assert!(matches!(
            Sample::load_from_file(file.path()),
            Err(ConfigError::ParseError(..))
        ));
        let file = write_file("[sample-app]\nport = \"high\"\n");
        assert!(matches!(
            Sample::load_from_file(file.path()),
            Err(ConfigError::ParseError(..))
        ));
    }

    #[test]
    fn test_unreadable_file() {
        let err = Sample::load_from_file(Path::new("/nonexistent/sample-app.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError(..)));
    }
}
