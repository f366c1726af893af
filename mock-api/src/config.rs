use config::{Config as Cfg, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MockConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seed the 김아빠/김엄마 demo family on startup.
    #[serde(default = "default_seed")]
    pub seed_demo_data: bool,
}

fn default_port() -> u16 {
    9100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_seed() -> bool {
    true
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            log_level: default_log_level(),
            seed_demo_data: default_seed(),
        }
    }
}

impl MockConfig {
    /// Reads `MOCK_PORT`, `MOCK_LOG_LEVEL` and `MOCK_SEED_DEMO_DATA`, plus an optional `mock-api` file.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Cfg::builder()
            .add_source(File::with_name("mock-api").required(false))
            .add_source(Environment::with_prefix("MOCK"))
            .build()?
            .try_deserialize()
    }
}
