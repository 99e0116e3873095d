use std::path::PathBuf;

use config::ConfigError;

#[derive(Debug, serde::Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub static_dir: PathBuf,
}

#[derive(Debug, serde::Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub log_config: Option<String>,
}

impl Config {
    /// Environment wins over the defaults, e.g. `HUDDLE_SERVER__PORT=8080`.
    pub fn from_env() -> Result<Self, ConfigError> {
        config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("storage.upload_dir", "uploads")?
            .set_default("storage.static_dir", "public")?
            .add_source(config::Environment::with_prefix("HUDDLE").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_deployed_service() {
        let config = Config::from_env().unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.storage.static_dir, PathBuf::from("public"));
    }
}
