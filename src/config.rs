//! Process configuration
//!
//! All knobs come from the environment (a `.env` file is honored at
//! startup). The config is built once in `main` and carried inside
//! `AppState`; nothing reads environment variables after startup except
//! provider key resolution, which is deliberately per-request so keys can
//! be rotated without a restart.

use std::str::FromStr;

/// Default role models; overridable via `PRO_MODEL_ID` / `CON_MODEL_ID` /
/// `JUDGE_MODEL_ID`.
pub const PRO_DEFAULT_MODEL: &str = "deepseek/deepseek-chat";
pub const CON_DEFAULT_MODEL: &str = "zhipu/glm-4-plus";
pub const JUDGE_DEFAULT_MODEL: &str = "groq/llama-3.3-70b-versatile";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub pro_model: String,
    pub con_model: String,
    pub judge_model: String,
    pub tavily_api_key: Option<String>,
}

/// Read an env var, stripping inline comments and whitespace, falling
/// back to `default` when unset or unparseable.
fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(val) => {
            let clean = val.split('#').next().unwrap_or("").trim();
            clean.parse::<T>().unwrap_or(default)
        }
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_var_or("ROSTRUM_HOST", "0.0.0.0".to_string()),
            port: env_var_or("ROSTRUM_PORT", 3002),
            database_url: env_var_or("DATABASE_URL", "sqlite:debate.db?mode=rwc".to_string()),
            pro_model: env_var_or("PRO_MODEL_ID", PRO_DEFAULT_MODEL.to_string()),
            con_model: env_var_or("CON_MODEL_ID", CON_DEFAULT_MODEL.to_string()),
            judge_model: env_var_or("JUDGE_MODEL_ID", JUDGE_DEFAULT_MODEL.to_string()),
            tavily_api_key: std::env::var("TAVILY_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
        }
    }

    /// Server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether the web-search tool path is available.
    pub fn search_enabled(&self) -> bool {
        self.tavily_api_key.is_some()
    }
}

/// Shorten a key for startup logging.
pub fn mask_key(key: &str) -> String {
    if key.len() > 4 {
        format!("{}...", &key[..4])
    } else {
        "***".to_string()
    }
}
