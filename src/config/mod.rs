use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

use crate::auth::PlanTier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub coach: CoachConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Shared secret for verifying identity-provider session tokens
    pub jwt_secret: String,
}

/// Everything the AI coaching pipeline reads at runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachConfig {
    pub enabled: bool,
    pub model: String,
    pub model_base_url: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub requests_per_minute: u32,
    pub rate_window_secs: i64,
    pub cache_ttl_secs: i64,
    pub max_body_bytes: usize,
    pub model_timeout_secs: u64,
    pub aggregation_timeout_secs: u64,
    pub min_plan: PlanTier,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Environment presets first, specific env vars override
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_ENABLE_CORS") {
            self.api.enable_cors = v.parse().unwrap_or(self.api.enable_cors);
        }

        if let Ok(v) = env::var("COACH_JWT_SECRET") {
            self.security.jwt_secret = v;
        }

        if let Ok(v) = env::var("COACH_ENABLED") {
            self.coach.enabled = v.parse().unwrap_or(self.coach.enabled);
        }
        if let Ok(v) = env::var("COACH_MODEL") {
            self.coach.model = v;
        }
        if let Ok(v) = env::var("COACH_MODEL_BASE_URL") {
            self.coach.model_base_url = v;
        }
        if let Ok(v) = env::var("COACH_MAX_OUTPUT_TOKENS") {
            self.coach.max_output_tokens = v.parse().unwrap_or(self.coach.max_output_tokens);
        }
        if let Ok(v) = env::var("COACH_TEMPERATURE") {
            self.coach.temperature = v.parse().unwrap_or(self.coach.temperature);
        }
        if let Ok(v) = env::var("COACH_REQUESTS_PER_MINUTE") {
            self.coach.requests_per_minute = v.parse().unwrap_or(self.coach.requests_per_minute);
        }
        if let Ok(v) = env::var("COACH_RATE_WINDOW_SECS") {
            self.coach.rate_window_secs = v.parse().unwrap_or(self.coach.rate_window_secs);
        }
        if let Ok(v) = env::var("COACH_CACHE_TTL_SECS") {
            self.coach.cache_ttl_secs = v.parse().unwrap_or(self.coach.cache_ttl_secs);
        }
        if let Ok(v) = env::var("COACH_MAX_BODY_BYTES") {
            self.coach.max_body_bytes = v.parse().unwrap_or(self.coach.max_body_bytes);
        }
        if let Ok(v) = env::var("COACH_MODEL_TIMEOUT_SECS") {
            self.coach.model_timeout_secs = v.parse().unwrap_or(self.coach.model_timeout_secs);
        }
        if let Ok(v) = env::var("COACH_AGGREGATION_TIMEOUT_SECS") {
            self.coach.aggregation_timeout_secs =
                v.parse().unwrap_or(self.coach.aggregation_timeout_secs);
        }
        if let Ok(v) = env::var("COACH_MIN_PLAN") {
            self.coach.min_plan = PlanTier::from_tag(&v);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                enable_request_logging: true,
                enable_cors: true,
            },
            security: SecurityConfig {
                jwt_secret: "dev-secret-do-not-use".to_string(),
            },
            coach: CoachConfig {
                enabled: true,
                model: "gpt-4o-mini".to_string(),
                model_base_url: "https://api.openai.com/v1".to_string(),
                max_output_tokens: 1200,
                temperature: 0.4,
                requests_per_minute: 30,
                rate_window_secs: 60,
                cache_ttl_secs: 15 * 60,
                max_body_bytes: 64 * 1024,
                model_timeout_secs: 60,
                aggregation_timeout_secs: 10,
                min_plan: PlanTier::Free,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            api: ApiConfig {
                enable_request_logging: true,
                enable_cors: true,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
            },
            coach: CoachConfig {
                enabled: true,
                model: "gpt-4o-mini".to_string(),
                model_base_url: "https://api.openai.com/v1".to_string(),
                max_output_tokens: 1200,
                temperature: 0.4,
                requests_per_minute: 10,
                rate_window_secs: 60,
                cache_ttl_secs: 30 * 60,
                max_body_bytes: 32 * 1024,
                model_timeout_secs: 45,
                aggregation_timeout_secs: 8,
                min_plan: PlanTier::Pro,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                enable_request_logging: false,
                enable_cors: true,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
            },
            coach: CoachConfig {
                enabled: true,
                model: "gpt-4o".to_string(),
                model_base_url: "https://api.openai.com/v1".to_string(),
                max_output_tokens: 1500,
                temperature: 0.3,
                requests_per_minute: 5,
                rate_window_secs: 60,
                cache_ttl_secs: 60 * 60,
                max_body_bytes: 32 * 1024,
                model_timeout_secs: 45,
                aggregation_timeout_secs: 5,
                min_plan: PlanTier::Pro,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
