use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "deepseek-coder-v2";
pub const DEFAULT_TITLE_WORDS: usize = 3;
pub const DEFAULT_SYSTEM_PREAMBLE: &str = "You are a cybersecurity expert assistant. \
If anyone asks your name, your name is SecureGPT. \
Answer clearly and include code examples when they help.";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub system_preamble: Option<String>,
    pub filter_responses: Option<bool>,
    pub title_words: Option<usize>,
    pub data_dir: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    /// Write to the default location and return where it went
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Preamble prepended to every prompt; an empty string disables it
    pub fn system_preamble(&self) -> Option<&str> {
        match self.system_preamble.as_deref() {
            Some("") => None,
            Some(preamble) => Some(preamble),
            None => Some(DEFAULT_SYSTEM_PREAMBLE),
        }
    }

    pub fn filter_responses(&self) -> bool {
        self.filter_responses.unwrap_or(true)
    }

    pub fn title_words(&self) -> usize {
        self.title_words.filter(|&n| n > 0).unwrap_or(DEFAULT_TITLE_WORDS)
    }

    /// Where chat history and logs live
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;

        Ok(data_dir.join("securegpt"))
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("securegpt").join("config.json"))
    }
}
