use thiserror::Error;

/// Failure to acquire or refresh the session handle. Request-scoped: the
/// caller surfaces it as a `SERVER_ERROR` frame and a later request will
/// attempt the refresh again. Never fatal to the process.
#[derive(Error, Debug, Clone)]
#[error("session-creation error: {0}")]
pub struct SessionError(pub String);

/// Failure of one `AdaptMessage` round trip, always caught at the call site
/// and turned into a synthesized `SERVER_ERROR` frame.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0}")]
    Grpc(#[from] tonic::Status),
}

/// Startup failures: bind failure, credential acquisition failure, or a
/// failed initial session creation. Fatal — the launcher logs and exits.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to connect to the Spanner Adapter endpoint: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("initial session creation failed: {0}")]
    InitialSession(#[from] SessionError),
    #[error("databaseUri {0:?} is not usable as gRPC metadata")]
    InvalidDatabaseUri(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required option: {0}")]
    MissingRequired(&'static str),
    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse YAML config {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("could not parse properties file {path}: invalid line {line:?}")]
    Properties { path: String, line: String },
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
