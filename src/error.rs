use thiserror::Error;

/// Failure reported by an external telemetry or limit source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The parameter is unknown to the source.
    #[error("{msid} not found in source")]
    NotFound { msid: String },
    /// Any other source failure (archive offline, malformed record, ...).
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    pub fn not_found(msid: impl Into<String>) -> Self {
        Self::NotFound { msid: msid.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrendError {
    /// Too few samples or windows for the requested computation.
    #[error("insufficient data: need at least {required} points, have {actual}")]
    InsufficientData { required: usize, actual: usize },
    /// Line fit over points that share a single timestamp.
    #[error("degenerate fit: {0}")]
    DegenerateFit(String),
    /// Channel lengths or ordering violate the series invariants.
    #[error("invalid series: {0}")]
    InvalidSeries(String),
    /// Non-finite or out-of-range numbers reaching a computation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{msid} not found")]
    NotFound { msid: String },
    #[error("source failure for {msid}: {source}")]
    Source {
        msid: String,
        #[source]
        source: SourceError,
    },
    #[error("forecast is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("forecast for {msid} failed: {reason}")]
    Failed { msid: String, reason: String },
}

impl TrendError {
    pub fn insufficient(required: usize, actual: usize) -> Self {
        Self::InsufficientData { required, actual }
    }

    /// Stable identifier for reports and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientData { .. } => "insufficient_data",
            Self::DegenerateFit(_) => "degenerate_fit",
            Self::InvalidSeries(_) => "invalid_series",
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound { .. } => "not_found",
            Self::Source { .. } => "source_failed",
            Self::InvalidState { .. } => "invalid_state",
            Self::Failed { .. } => "forecast_failed",
        }
    }

    pub(crate) fn from_source(msid: &str, source: SourceError) -> Self {
        match source {
            SourceError::NotFound { msid } => Self::NotFound { msid },
            other => Self::Source {
                msid: msid.to_string(),
                source: other,
            },
        }
    }
}

pub type TrendResult<T> = Result<T, TrendError>;
