use config::{Config, ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub pg_database_url: String,
    pub api_key: String,
    pub jwt_secret: String,
    pub token_expire_minutes: i64,
    pub bind_address: String,
    pub pg_pool_workers: usize,
    pub groq_api_key: Option<String>,
    pub llm_model: String,
    pub llm_base_url: String,
}

impl Settings {
    /// Reads settings from the process environment (`PG_DATABASE_URL`, `API_KEY`, ...).
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_source(Environment::default().try_parsing(true))
    }

    fn from_source(env: Environment) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .set_default("token_expire_minutes", 30)?
            .set_default("bind_address", "127.0.0.1:8080")?
            .set_default("pg_pool_workers", 5)?
            .set_default("llm_model", "llama-3.3-70b-versatile")?
            .set_default("llm_base_url", "https://api.groq.com/openai/v1")?
            .add_source(env)
            .build()?
            .try_deserialize()?;

        if settings.api_key.is_empty() || settings.jwt_secret.is_empty() {
            return Err(ConfigError::Message(
                "API_KEY and JWT_SECRET must not be empty".into(),
            ));
        }

        Ok(settings)
    }
}
