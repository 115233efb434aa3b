use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use anyhow::Result;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub oracle: OracleConfig,
    pub parser: ParserConfig,
    pub storage: StorageConfig,
}

/// 文本补全Oracle（OpenAI兼容接口）配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleConfig {
    pub api_provider: String,
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParserConfig {
    pub max_keywords: usize,
    pub attach_images: bool,
    pub enrich_math: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub assessment_cache_capacity: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from("config/settings.toml");

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            oracle: OracleConfig {
                api_provider: "openai".to_string(),
                api_key: "your-api-key".to_string(),
                api_url: "https://api.openai.com/v1/chat/completions".to_string(),
                model: "gpt-3.5-turbo".to_string(),
                timeout_secs: 60,
            },
            parser: ParserConfig {
                max_keywords: 15,
                attach_images: true,
                enrich_math: true,
            },
            storage: StorageConfig {
                assessment_cache_capacity: 10,
            },
        }
    }
}
