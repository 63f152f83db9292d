use std::env;

pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LOG_FILTER: &str = "course_forge=info,tower_http=info";

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            openai_api_key: String::new(),
            openai_base_url: DEFAULT_BASE_URL.into(),
            openai_model: DEFAULT_MODEL.into(),
            log_filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(port) = lookup("PORT").and_then(|s| s.parse().ok()) {
            settings.port = port;
        }
        if let Some(v) = lookup("OPENAI_API_KEY") {
            settings.openai_api_key = v;
        }
        if let Some(v) = lookup("OPENAI_BASE_URL").filter(|v| !v.trim().is_empty()) {
            settings.openai_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("OPENAI_MODEL").filter(|v| !v.trim().is_empty()) {
            settings.openai_model = v;
        }
        if let Some(v) = lookup("RUST_LOG") {
            settings.log_filter = v;
        }

        settings
    }
}
