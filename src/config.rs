use crate::analyzer::{GroqAnalyzer, DEFAULT_CHAT_MODEL};
use crate::chatbot::GroqChat;
use crate::error::{GatewayError, GatewayResult};
use crate::llm::CompletionClient;
use crate::ocr::{MistralOcr, DEFAULT_OCR_MODEL};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DB_FILE_NAME: &str = "form_intake.db";
pub const DEFAULT_LOG_LEVEL: &str = "info";
const APP_DIR_NAME: &str = "form-intake";
/// Keys this short are treated as placeholders.
const MIN_KEY_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub mistral_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub mistral_base_url: String,
    pub groq_base_url: String,
    pub ocr_model: String,
    pub chat_model: String,
    pub timeout: Duration,
    pub data_dir: PathBuf,
    /// `EnvFilter` directive from `RUST_LOG`, else `FORM_INTAKE_LOG`.
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyValidation {
    pub mistral: bool,
    pub groq: bool,
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Value of `key` in a `.env` file without exporting anything.
fn env_file_value(path: &Path, key: &str) -> Option<String> {
    dotenvy::from_path_iter(path)
        .ok()?
        .filter_map(Result::ok)
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
        .filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Read configuration from the environment and the `.env` files.
    ///
    /// Precedence, highest first: process environment, `<data_dir>/.env`, `./.env`.
    /// `FORM_INTAKE_DATA_DIR` itself may come from the process environment or `./.env`.
    pub fn from_env() -> Self {
        Self::from_env_files(Path::new(".env"))
    }

    /// `from_env` with an explicit working-directory `.env` path.
    pub fn from_env_files(cwd_env: &Path) -> Self {
        let data_dir = std::env::var("FORM_INTAKE_DATA_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env_file_value(cwd_env, "FORM_INTAKE_DATA_DIR"))
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        // dotenvy never overrides a variable that is already set, so load order is precedence order.
        let data_env = data_dir.join(".env");
        if data_env.exists() {
            let _ = dotenvy::from_path(&data_env);
        }
        if cwd_env.exists() {
            let _ = dotenvy::from_path(cwd_env);
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout = get("FORM_INTAKE_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Config {
            mistral_api_key: get("MISTRAL_API_KEY"),
            groq_api_key: get("GROQ_API_KEY"),
            mistral_base_url: get("MISTRAL_BASE_URL").unwrap_or_else(|| DEFAULT_MISTRAL_BASE_URL.to_string()),
            groq_base_url: get("GROQ_BASE_URL").unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string()),
            ocr_model: get("FORM_INTAKE_OCR_MODEL").unwrap_or_else(|| DEFAULT_OCR_MODEL.to_string()),
            chat_model: get("FORM_INTAKE_CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            timeout: Duration::from_secs(timeout),
            data_dir: get("FORM_INTAKE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
            log_level: get("RUST_LOG")
                .or_else(|| get("FORM_INTAKE_LOG"))
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn validate_api_keys(&self) -> KeyValidation {
        let valid = |k: &Option<String>| k.as_deref().is_some_and(|k| k.len() > MIN_KEY_LEN);
        KeyValidation {
            mistral: valid(&self.mistral_api_key),
            groq: valid(&self.groq_api_key),
        }
    }

    /// `configured` / `not_configured` per provider.
    pub fn status(&self) -> [(&'static str, &'static str); 2] {
        let label = |ok: bool| if ok { "configured" } else { "not_configured" };
        let keys = self.validate_api_keys();
        [("mistral", label(keys.mistral)), ("groq", label(keys.groq))]
    }

    fn client(&self, base_url: &str, key: &Option<String>, var: &'static str) -> GatewayResult<CompletionClient> {
        let key = key.as_deref().ok_or(GatewayError::MissingKey(var))?;
        CompletionClient::new(base_url, key, self.timeout)
    }

    pub fn ocr_gateway(&self) -> GatewayResult<MistralOcr> {
        let client = self.client(&self.mistral_base_url, &self.mistral_api_key, "MISTRAL_API_KEY")?;
        Ok(MistralOcr::new(client, self.ocr_model.clone()))
    }

    pub fn analysis_gateway(&self) -> GatewayResult<GroqAnalyzer> {
        let client = self.client(&self.groq_base_url, &self.groq_api_key, "GROQ_API_KEY")?;
        Ok(GroqAnalyzer::new(client, self.chat_model.clone()))
    }

    pub fn chat_gateway(&self) -> GatewayResult<GroqChat> {
        let client = self.client(&self.groq_base_url, &self.groq_api_key, "GROQ_API_KEY")?;
        Ok(GroqChat::new(client, self.chat_model.clone()))
    }
}
