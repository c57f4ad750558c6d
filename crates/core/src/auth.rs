//! Public project settings for the hosted auth / document store.
//!
//! These values are shipped to browsers, so nothing here is secret. Missing values fall
//! back to demo placeholders; sign-in stays disabled until real ones are provided.

use crate::env::EnvSource;
use serde::Serialize;

const DEMO_API_KEY: &str = "demo-api-key";
const DEMO_PROJECT_ID: &str = "demo-project";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthProjectConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
    pub measurement_id: String,
}

impl AuthProjectConfig {
    pub fn from_env(env: &dyn EnvSource) -> Self {
        let get = |name: &str, fallback: &str| {
            env.var(&format!("NEXT_PUBLIC_FIREBASE_{name}"))
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };

        Self {
            api_key: get("API_KEY", DEMO_API_KEY),
            auth_domain: get("AUTH_DOMAIN", "demo-project.firebaseapp.com"),
            project_id: get("PROJECT_ID", DEMO_PROJECT_ID),
            storage_bucket: get("STORAGE_BUCKET", "demo-project.appspot.com"),
            messaging_sender_id: get("MESSAGING_SENDER_ID", "123456789"),
            app_id: get("APP_ID", "1:123456789:web:abcdef123456"),
            measurement_id: get("MEASUREMENT_ID", "G-XXXXXXXXXX"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key != DEMO_API_KEY && self.project_id != DEMO_PROJECT_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;

    #[test]
    fn falls_back_to_demo_values() {
        let config = AuthProjectConfig::from_env(&MapEnv::new());
        assert_eq!(config.project_id, "demo-project");
        assert_eq!(config.measurement_id, "G-XXXXXXXXXX");
        assert!(!config.is_configured());
    }

    #[test]
    fn real_key_and_project_mark_configured() {
        let env = MapEnv::new()
            .with_var("NEXT_PUBLIC_FIREBASE_API_KEY", "AIzaReal")
            .with_var("NEXT_PUBLIC_FIREBASE_PROJECT_ID", "omniplex-prod");
        let config = AuthProjectConfig::from_env(&env);
        assert!(config.is_configured());
        assert_eq!(config.auth_domain, "demo-project.firebaseapp.com");
    }

    #[test]
    fn partial_configuration_is_not_enough() {
        let env = MapEnv::new().with_var("NEXT_PUBLIC_FIREBASE_API_KEY", "AIzaReal");
        assert!(!AuthProjectConfig::from_env(&env).is_configured());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(AuthProjectConfig::from_env(&MapEnv::new())).unwrap();
        assert!(json.get("messagingSenderId").is_some());
        assert!(json.get("storageBucket").is_some());
    }
}
