// Copyright 2023 Remi Bernotavicius

use crate::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub workbook: Option<PathBuf>,
    pub log_level: Option<String>,
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "meal_planner")
        .ok_or_else(|| "failed to get user home directory".into())
}

/// On Linux this should be like `~/.config/meal_planner/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// This is where the workbook lives on-disk unless configured otherwise. On Linux it should be
/// like: `~/.local/share/meal_planner/`
fn data_path() -> Result<PathBuf> {
    let path = project_dirs()?.data_dir().to_owned();
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// A missing file is the same as an empty one.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn workbook_path(&self) -> Result<PathBuf> {
        match &self.workbook {
            Some(path) => Ok(path.clone()),
            None => Ok(data_path()?.join("workbook.sqlite")),
        }
    }

    pub fn log_level(&self) -> Result<Option<log::LevelFilter>> {
        self.log_level
            .as_deref()
            .map(|level| {
                level
                    .parse()
                    .map_err(|_| format!("invalid log_level {level:?}").into())
            })
            .transpose()
    }
}

#[test]
fn empty_config_is_default() {
    assert_eq!(Config::parse("").unwrap(), Config::default());
}

#[test]
fn config_keys() {
    let config = Config::parse(
        r#"
        workbook = "/tmp/plan.sqlite"
        log_level = "debug"
        "#,
    )
    .unwrap();
    assert_eq!(config.workbook_path().unwrap(), PathBuf::from("/tmp/plan.sqlite"));
    assert_eq!(config.log_level().unwrap(), Some(log::LevelFilter::Debug));
}

#[test]
fn bad_config_is_rejected() {
    assert!(Config::parse("spreadsheet = 'x'").is_err());
    let config = Config::parse("log_level = 'loud'").unwrap();
    assert!(config.log_level().is_err());
}

#[test]
fn missing_config_file_is_default() {
    let path = std::env::temp_dir().join("meal-planner-no-such-config.toml");
    assert_eq!(Config::load(path).unwrap(), Config::default());
}
