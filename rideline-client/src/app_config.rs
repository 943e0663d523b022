use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the remote booking service, e.g. "https://api.example.com"
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Bearer token; auth itself is handled by a collaborator, the client
    /// only forwards whatever it is given
    pub auth_token: Option<String>,
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            // E.g. `RIDELINE_API__BASE_URL` sets `api.base_url`
            .add_source(config::Environment::with_prefix("RIDELINE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
