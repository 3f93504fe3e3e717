use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("tvguide.db")
}

/// Update configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateConfig {
    /// Programs that stopped more than this many hours ago are removed after
    /// each update. 0 keeps everything.
    #[serde(default = "default_expire_after_hours")]
    pub expire_after_hours: u32,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            expire_after_hours: default_expire_after_hours(),
        }
    }
}

fn default_expire_after_hours() -> u32 {
    24
}

/// Guide data sources
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourcesConfig {
    /// Local JSON guide dumps (`[[sources.json]]`)
    #[serde(default)]
    pub json: Vec<JsonSourceConfig>,
}

/// A JSON guide dump registered as an update backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonSourceConfig {
    /// Backend name used to select this source on update
    pub name: String,
    pub path: PathBuf,
}

/// Config view for API responses (source paths reduced to availability)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub update: UpdateConfig,
    pub sources: Vec<SanitizedSourceConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSourceConfig {
    pub name: String,
    pub kind: String,
    pub available: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            update: config.update.clone(),
            sources: config
                .sources
                .json
                .iter()
                .map(|s| SanitizedSourceConfig {
                    name: s.name.clone(),
                    kind: "json".to_string(),
                    available: s.path.is_file(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "tvguide.db");
        assert_eq!(config.update.expire_after_hours, 24);
        assert!(config.sources.json.is_empty());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
path = "/data/guide.sqlite"

[update]
expire_after_hours = 0

[[sources.json]]
name = "local"
path = "/data/local.json"

[[sources.json]]
name = "backup"
path = "/data/backup.json"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.path.to_str().unwrap(), "/data/guide.sqlite");
        assert_eq!(config.update.expire_after_hours, 0);
        let names: Vec<&str> = config.sources.json.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["local", "backup"]);
    }

    #[test]
    fn test_deserialize_source_missing_path_fails() {
        let toml = r#"
[[sources.json]]
name = "local"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_sanitized_config() {
        let mut config = Config::default();
        config.sources.json.push(JsonSourceConfig {
            name: "local".to_string(),
            path: PathBuf::from("/nonexistent/guide.json"),
        });

        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.server.port, 8080);
        assert_eq!(sanitized.sources.len(), 1);
        assert_eq!(sanitized.sources[0].kind, "json");
        assert!(!sanitized.sources[0].available);
    }
}
