use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::app_dirs::AppDirs;
use crate::error::Result;
use crate::session::{Mode, TestConfiguration, TextSource};

/// Last-used test settings, remembered between runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    pub target_value: u32,
    pub text_source: TextSource,
    pub custom_text: String,
    /// Email of the user results are saved for.
    pub user_email: Option<String>,
    pub user_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Time,
            target_value: Mode::Time.default_target(),
            text_source: TextSource::Random,
            custom_text: String::new(),
            user_email: None,
            user_name: None,
        }
    }
}

impl Config {
    pub fn test_configuration(&self) -> TestConfiguration {
        TestConfiguration {
            mode: self.mode,
            target_value: self.target_value,
            text_source: self.text_source,
            text: self.custom_text.clone(),
        }
    }

    /// Remember the settings of a test that was started.
    pub fn remember(&mut self, config: &TestConfiguration) {
        self.mode = config.mode;
        self.target_value = config.target_value;
        self.text_source = config.text_source;
        if config.text_source == TextSource::Custom {
            self.custom_text = config.text.clone();
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("typecafe_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
