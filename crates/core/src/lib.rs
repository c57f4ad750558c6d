pub mod auth;
pub mod env;
pub mod llm;
pub mod stripe;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub app_env: Option<String>,
        pub enable_env_debug: bool,
        pub openai_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub runtime_config_path: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                app_env: std::env::var("APP_ENV").ok(),
                enable_env_debug: std::env::var("ENABLE_ENV_DEBUG")
                    .map(|v| v == "true")
                    .unwrap_or(false),
                openai_api_key: std::env::var("OPENAI_API_KEY")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                runtime_config_path: std::env::var("RUNTIME_CONFIG_PATH")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
            })
        }

        pub fn is_development(&self) -> bool {
            matches!(self.app_env.as_deref(), Some("development"))
        }

        /// The env debug endpoint is served only in development or when explicitly enabled.
        pub fn env_debug_allowed(&self) -> bool {
            self.is_development() || self.enable_env_debug
        }

        pub fn require_openai_api_key(&self) -> anyhow::Result<&str> {
            self.openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY is required")
        }
    }

}
