//! Configuration precedence, lowest to highest: built-in defaults, a YAML
//! or flat `key=value` properties file named by `--config-file-path`,
//! environment variables, then CLI flags.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 9042;
const DEFAULT_NUM_GRPC_CHANNELS: usize = 4;
const DEFAULT_SPANNER_ENDPOINT: &str = "spanner.googleapis.com:443";

const ENV_ENABLE_DIRECT_ACCESS: &str = "GOOGLE_SPANNER_ENABLE_DIRECT_ACCESS";
const ENV_SPANNER_ENDPOINT: &str = "SPANNER_ENDPOINT";

#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct Args {
    #[arg(long)]
    pub database_uri: Option<String>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub num_grpc_channels: Option<usize>,
    #[arg(long)]
    pub max_commit_delay_millis: Option<u64>,
    #[arg(long)]
    pub spanner_endpoint: Option<String>,
    #[arg(long)]
    pub use_plain_text: Option<bool>,
    #[arg(long)]
    pub enable_built_in_metrics: Option<bool>,
    #[arg(long)]
    pub health_check_port: Option<u16>,
    #[arg(long)]
    pub config_file_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub database_uri: String,
    pub host: String,
    pub port: u16,
    pub num_grpc_channels: usize,
    pub max_commit_delay_millis: u64,
    pub spanner_endpoint: String,
    pub use_plain_text: bool,
    pub enable_built_in_metrics: bool,
    /// `None` disables the health endpoint entirely.
    pub health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartialConfig {
    database_uri: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    num_grpc_channels: Option<usize>,
    max_commit_delay_millis: Option<u64>,
    spanner_endpoint: Option<String>,
    use_plain_text: Option<bool>,
    enable_built_in_metrics: Option<bool>,
    health_check_port: Option<u16>,
}

impl PartialConfig {
    /// `other`'s fields win wherever they are set; `self` is the fallback.
    fn overlay(self, other: PartialConfig) -> PartialConfig {
        PartialConfig {
            database_uri: other.database_uri.or(self.database_uri),
            host: other.host.or(self.host),
            port: other.port.or(self.port),
            num_grpc_channels: other.num_grpc_channels.or(self.num_grpc_channels),
            max_commit_delay_millis: other.max_commit_delay_millis.or(self.max_commit_delay_millis),
            spanner_endpoint: other.spanner_endpoint.or(self.spanner_endpoint),
            use_plain_text: other.use_plain_text.or(self.use_plain_text),
            enable_built_in_metrics: other.enable_built_in_metrics.or(self.enable_built_in_metrics),
            health_check_port: other.health_check_port.or(self.health_check_port),
        }
    }

    fn from_args(args: &Args) -> PartialConfig {
        PartialConfig {
            database_uri: args.database_uri.clone(),
            host: args.host.clone(),
            port: args.port,
            num_grpc_channels: args.num_grpc_channels,
            max_commit_delay_millis: args.max_commit_delay_millis,
            spanner_endpoint: args.spanner_endpoint.clone(),
            use_plain_text: args.use_plain_text,
            enable_built_in_metrics: args.enable_built_in_metrics,
            health_check_port: args.health_check_port,
        }
    }

    fn from_env() -> Result<PartialConfig, ConfigError> {
        let mut partial = PartialConfig::default();

        if let Ok(value) = std::env::var(ENV_ENABLE_DIRECT_ACCESS) {
            partial.use_plain_text = Some(!parse_bool(ENV_ENABLE_DIRECT_ACCESS, &value)?);
        }
        if let Ok(value) = std::env::var(ENV_SPANNER_ENDPOINT) {
            partial.spanner_endpoint = Some(value);
        }

        Ok(partial)
    }

    fn from_file(path: &Path) -> Result<PartialConfig, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        if path.extension().and_then(|ext| ext.to_str()) == Some("properties") {
            parse_properties(path, &contents)
        } else {
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Yaml {
                path: path.display().to_string(),
                source,
            })
        }
    }
}

impl ProxyConfig {
    pub fn load(args: Args) -> Result<ProxyConfig, ConfigError> {
        let mut merged = PartialConfig::default();

        if let Some(path) = &args.config_file_path {
            merged = merged.overlay(PartialConfig::from_file(path)?);
        }
        merged = merged.overlay(PartialConfig::from_env()?);
        merged = merged.overlay(PartialConfig::from_args(&args));

        Ok(ProxyConfig {
            database_uri: merged
                .database_uri
                .ok_or(ConfigError::MissingRequired("databaseUri"))?,
            host: merged.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: merged.port.unwrap_or(DEFAULT_PORT),
            num_grpc_channels: merged.num_grpc_channels.unwrap_or(DEFAULT_NUM_GRPC_CHANNELS),
            max_commit_delay_millis: merged.max_commit_delay_millis.unwrap_or(0),
            spanner_endpoint: merged
                .spanner_endpoint
                .unwrap_or_else(|| DEFAULT_SPANNER_ENDPOINT.to_string()),
            use_plain_text: merged.use_plain_text.unwrap_or(false),
            enable_built_in_metrics: merged.enable_built_in_metrics.unwrap_or(false),
            health_check_port: merged.health_check_port,
        })
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

/// Parses a Java-properties-style `key=value` file into the same field set
/// a YAML document would populate, using the same camelCase key names.
fn parse_properties(path: &Path, contents: &str) -> Result<PartialConfig, ConfigError> {
    let mut partial = PartialConfig::default();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Properties {
            path: path.display().to_string(),
            line: line.to_string(),
        })?;
        let (key, value) = (key.trim(), value.trim());

        match key {
            "databaseUri" => partial.database_uri = Some(value.to_string()),
            "host" => partial.host = Some(value.to_string()),
            "port" => partial.port = Some(parse_field("port", value)?),
            "numGrpcChannels" => {
                partial.num_grpc_channels = Some(parse_field("numGrpcChannels", value)?)
            }
            "maxCommitDelayMillis" => {
                partial.max_commit_delay_millis = Some(parse_field("maxCommitDelayMillis", value)?)
            }
            "spannerEndpoint" => partial.spanner_endpoint = Some(value.to_string()),
            "usePlainText" => {
                partial.use_plain_text = Some(parse_bool_owned("usePlainText", value)?)
            }
            "enableBuiltInMetrics" => {
                partial.enable_built_in_metrics =
                    Some(parse_bool_owned("enableBuiltInMetrics", value)?)
            }
            "healthCheckPort" => {
                partial.health_check_port = Some(parse_field("healthCheckPort", value)?)
            }
            _ => {
                return Err(ConfigError::Properties {
                    path: path.display().to_string(),
                    line: line.to_string(),
                })
            }
        }
    }

    Ok(partial)
}

fn parse_field<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn parse_bool_owned(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(key, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_win_over_everything() {
        let mut args = Args::default();
        args.database_uri = Some("projects/p/instances/i/databases/d".to_string());
        args.port = Some(5555);

        let config = ProxyConfig::load(args).unwrap();
        assert_eq!(config.port, 5555);
        assert_eq!(config.host, DEFAULT_HOST);
    }

    #[test]
    fn missing_database_uri_is_an_error() {
        let err = ProxyConfig::load(Args::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired("databaseUri")));
    }

    #[test]
    fn properties_file_round_trips_known_keys() {
        let contents = "databaseUri=projects/p/instances/i/databases/d\nport=7000\nusePlainText=true\n";
        let partial = parse_properties(Path::new("test.properties"), contents).unwrap();
        assert_eq!(partial.port, Some(7000));
        assert_eq!(partial.use_plain_text, Some(true));
    }

    #[test]
    fn malformed_properties_line_is_rejected() {
        let err = parse_properties(Path::new("test.properties"), "not-a-key-value-line").unwrap_err();
        assert!(matches!(err, ConfigError::Properties { .. }));
    }
}
