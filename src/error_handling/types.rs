use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidVar { name: &'static str, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingVar(name) => {
                write!(f, "Required environment variable {} is not set", name)
            }
            ConfigError::InvalidVar { name, message } => {
                write!(f, "Invalid value for {}: {}", name, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors raised by the log store.
///
/// `ConnectionFailed` covers everything up to and including authentication;
/// `QueryFailed` means a statement failed after a connection was established.
/// The failing operation is carried so a run can be diagnosed from its log
/// output alone.
#[derive(Debug)]
pub enum StoreError {
    ConnectionFailed(String),
    QueryFailed {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub(crate) fn query<E: fmt::Display>(operation: &'static str, err: E) -> Self {
        StoreError::QueryFailed {
            operation,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ConnectionFailed(e) => write!(f, "Store connection failed: {}", e),
            StoreError::QueryFailed { operation, message } => {
                write!(f, "Query failed ({}): {}", operation, message)
            }
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug)]
pub enum WebError {
    InvalidBindAddress(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::InvalidBindAddress(addr) => {
                write!(f, "Invalid bind address: {}", addr)
            }
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum PrunerError {
    ConfigurationError(ConfigError),
    StoreError(StoreError),
}

impl fmt::Display for PrunerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrunerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            PrunerError::StoreError(e) => write!(f, "Store error: {}", e),
        }
    }
}

impl std::error::Error for PrunerError {}

impl From<ConfigError> for PrunerError {
    fn from(err: ConfigError) -> Self {
        PrunerError::ConfigurationError(err)
    }
}

impl From<StoreError> for PrunerError {
    fn from(err: StoreError) -> Self {
        PrunerError::StoreError(err)
    }
}
