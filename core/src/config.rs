use crate::errors::{TutorError, TutorResult};
use crate::prompt::PromptKind;
use crate::client::CompletionOptions;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_VISION_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 4000;
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Configuration for the exam tutor
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct TutorConfig {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub model_name: Option<String>,
    pub vision_api_key: Option<String>,
    pub vision_api_url: Option<String>,
    pub vision_model_name: Option<String>,
    pub system_prompt: Option<String>,
    pub solve_temperature: Option<f32>,
    pub study_plan_temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub cache_capacity: Option<usize>,
    pub max_context_chars: Option<usize>,
    pub normalize_markup: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub log_level: Option<String>,
}

impl TutorConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> TutorResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| TutorError::ConfigError(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| TutorError::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> TutorResult<()> {
        let content = toml::to_string(self)
            .map_err(|e| TutorError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TutorError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content)
            .map_err(|e| TutorError::ConfigError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reads `TUTOR_*` environment variables. Unparseable numbers are ignored.
    pub fn from_env() -> Self {
        let var = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_key: var("TUTOR_API_KEY"),
            api_url: var("TUTOR_API_URL"),
            model_name: var("TUTOR_MODEL"),
            vision_api_key: var("TUTOR_VISION_API_KEY"),
            vision_api_url: var("TUTOR_VISION_API_URL"),
            vision_model_name: var("TUTOR_VISION_MODEL"),
            system_prompt: var("TUTOR_SYSTEM_PROMPT"),
            solve_temperature: var("TUTOR_SOLVE_TEMPERATURE").and_then(|v| v.parse().ok()),
            study_plan_temperature: var("TUTOR_STUDY_PLAN_TEMPERATURE")
                .and_then(|v| v.parse().ok()),
            max_output_tokens: var("TUTOR_MAX_OUTPUT_TOKENS").and_then(|v| v.parse().ok()),
            cache_capacity: var("TUTOR_CACHE_CAPACITY").and_then(|v| v.parse().ok()),
            max_context_chars: var("TUTOR_MAX_CONTEXT_CHARS").and_then(|v| v.parse().ok()),
            normalize_markup: var("TUTOR_NORMALIZE_MARKUP").map(|v| v != "0" && v != "false"),
            timeout_secs: var("TUTOR_TIMEOUT_SECS").and_then(|v| v.parse().ok()),
            log_level: var("TUTOR_LOG_LEVEL"),
        }
    }

    /// Defaults, then the config file, then the environment
    pub fn load_layered(path: &Path) -> TutorResult<Self> {
        Ok(Self::load_from_file(path)?.merge(&Self::from_env()))
    }

    /// Merges this config with another config, preferring values from the other config if present
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            api_key: other.api_key.clone().or_else(|| self.api_key.clone()),
            api_url: other.api_url.clone().or_else(|| self.api_url.clone()),
            model_name: other.model_name.clone().or_else(|| self.model_name.clone()),
            vision_api_key: other
                .vision_api_key
                .clone()
                .or_else(|| self.vision_api_key.clone()),
            vision_api_url: other
                .vision_api_url
                .clone()
                .or_else(|| self.vision_api_url.clone()),
            vision_model_name: other
                .vision_model_name
                .clone()
                .or_else(|| self.vision_model_name.clone()),
            system_prompt: other
                .system_prompt
                .clone()
                .or_else(|| self.system_prompt.clone()),
            solve_temperature: other.solve_temperature.or(self.solve_temperature),
            study_plan_temperature: other.study_plan_temperature.or(self.study_plan_temperature),
            max_output_tokens: other.max_output_tokens.or(self.max_output_tokens),
            cache_capacity: other.cache_capacity.or(self.cache_capacity),
            max_context_chars: other.max_context_chars.or(self.max_context_chars),
            normalize_markup: other.normalize_markup.or(self.normalize_markup),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            log_level: other.log_level.clone().or_else(|| self.log_level.clone()),
        }
    }

    /// The primary completion credential. Its absence is fatal at startup.
    pub fn require_api_key(&self) -> TutorResult<&str> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(TutorError::ConfigError(
                "TUTOR_API_KEY is required to start the tutor".to_string(),
            )),
        }
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    pub fn model_name(&self) -> &str {
        self.model_name.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn vision_api_url(&self) -> &str {
        self.vision_api_url.as_deref().unwrap_or_else(|| self.api_url())
    }

    pub fn vision_model_name(&self) -> &str {
        self.vision_model_name
            .as_deref()
            .unwrap_or(DEFAULT_VISION_MODEL)
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY)
    }

    pub fn max_context_chars(&self) -> usize {
        self.max_context_chars.unwrap_or(DEFAULT_MAX_CONTEXT_CHARS)
    }

    pub fn normalize_markup(&self) -> bool {
        self.normalize_markup.unwrap_or(true)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// Generation options for one prompt kind, validated
    pub fn completion_options(&self, kind: PromptKind) -> TutorResult<CompletionOptions> {
        let temperature = match kind {
            PromptKind::SolveQuestion | PromptKind::FollowUp => {
                self.solve_temperature.unwrap_or(0.2)
            }
            PromptKind::StudyPlan => self.study_plan_temperature.unwrap_or(0.7),
        };
        let max_tokens = self.max_output_tokens.unwrap_or(2048);
        Ok(CompletionOptions::new(temperature, max_tokens)?)
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> TutorResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .ok_or_else(|| TutorError::ConfigError("Could not determine home directory".to_string()))?;

    Ok(config_dir.join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> TutorResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}
