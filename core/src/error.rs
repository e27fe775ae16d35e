use thiserror::Error;

/// Invalid or missing startup configuration. Fatal, never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("refresh interval must be at least {min_ms} ms, got {value_ms} ms")]
    RefreshIntervalTooShort { value_ms: u64, min_ms: u64 },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("provider {0} is not implemented yet")]
    ProviderNotImplemented(String),

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("http client setup failed: {0}")]
    HttpClient(String),
}

impl ConfigurationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failure while fetching a quote. Recoverable: drives the monitor into ERROR.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("no price data for {symbol}")]
    NotFound { symbol: String },

    #[error("rate limit exceeded for {symbol} after {retries} retries")]
    RateLimited { symbol: String, retries: u32 },

    #[error("transport error{}: {body}", status_suffix(.status))]
    Transport { status: Option<u16>, body: String },
}

impl ApiError {
    pub fn transport(body: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            body: body.into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

/// A single alert strategy failed while evaluating a quote.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("non-finite {what} computed")]
    NonFinite { what: &'static str },

    #[error("strategy panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

/// A subscriber failed while handling an event.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObserverError {
    #[error("subscriber channel is full")]
    ChannelFull,

    #[error("subscriber channel is closed")]
    ChannelClosed,

    #[error("io error: {0}")]
    Io(String),

    #[error("observer panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Rejected(String),
}

impl From<std::io::Error> for ObserverError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("price must be positive and finite, got {0}")]
pub struct InvalidPrice(pub f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_display_includes_status_when_known() {
        let with_status = ApiError::Transport {
            status: Some(503),
            body: "upstream unavailable".into(),
        };
        assert_eq!(
            with_status.to_string(),
            "transport error (status 503): upstream unavailable"
        );

        let without = ApiError::transport("connection reset");
        assert_eq!(without.to_string(), "transport error: connection reset");
    }

    #[test]
    fn rate_limited_is_detected() {
        let e = ApiError::RateLimited {
            symbol: "bitcoin".into(),
            retries: 3,
        };
        assert!(e.is_rate_limited());
        assert!(!ApiError::transport("x").is_rate_limited());
    }
}
