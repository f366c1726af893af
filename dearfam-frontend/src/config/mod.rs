use secrecy::Secret;
use serde::Deserialize;
use session_core::config::ApiSettings;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub api: ApiSettings,
    pub oauth: OAuthSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub session_secret: Secret<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct OAuthSettings {
    /// Provider authorize endpoint the browser is sent to.
    pub authorize_url: String,
    pub client_id: String,
    /// Must point at this server's `/auth/oauth/callback`.
    pub redirect_uri: String,
    /// Accept callbacks that did not start at `/auth/oauth`. Only for the mock backend.
    #[serde(default)]
    pub allow_direct_callback: bool,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("current directory: {}", e)))?;

    // Run from the workspace root or from inside dearfam-frontend.
    let configuration_directory = if base_path.ends_with("dearfam-frontend") {
        base_path.join("config")
    } else {
        base_path.join("dearfam-frontend").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
