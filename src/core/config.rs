use std::env;

use anyhow::{Result, anyhow};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub history_path: String,
    pub relay_url: String,
    pub gemini_api_hostname: String,
    pub gemini_model: String,
    // Absent keys fail each request rather than startup
    pub gemini_api_key: Option<String>,
}

impl AppConfig {
    /// Returns the provider credential or an error suitable for
    /// failing a request before any streaming begins.
    pub fn require_api_key(&self) -> Result<&str> {
        self.gemini_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(anyhow!("Missing env var GEMINI_API_KEY"))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let host = "127.0.0.1";
        let port = "2222";
        let storage_path = env::var("CHAT_STORAGE_PATH").unwrap_or("./".to_string());
        let history_path = format!("{}/history", storage_path.trim_end_matches('/'));
        let relay_url =
            env::var("CHAT_RELAY_URL").unwrap_or(format!("http://{}:{}", host, port));
        let gemini_api_hostname = env::var("CHAT_GEMINI_API_HOSTNAME")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());
        let gemini_model =
            env::var("CHAT_GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());
        let gemini_api_key = env::var("GEMINI_API_KEY").ok();

        Self {
            storage_path,
            history_path,
            relay_url,
            gemini_api_hostname,
            gemini_model,
            gemini_api_key,
        }
    }
}
