use thiserror::Error;

/// Failure modes of a translator call.
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("translation service unreachable after {attempts} attempts: {message}")]
    Unavailable { attempts: u32, message: String },

    #[error("translation service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed translation response: {0}")]
    Malformed(String),
}

impl TranslateError {
    /// Whether the caller may try the same request again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslateError::Unavailable { .. } => true,
            TranslateError::Http { status, .. } => {
                matches!(*status, 408 | 429 | 500..=599)
            }
            TranslateError::Malformed(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("no centroid for state code '{0}'")]
    UnknownState(String),

    #[error("label translation failed: {0}")]
    Translation(#[from] TranslateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl DashboardError {
    pub fn is_retryable(&self) -> bool {
        match self {
            DashboardError::Translation(e) => e.is_retryable(),
            _ => false,
        }
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_translation_cause() {
        let down = DashboardError::from(TranslateError::Unavailable {
            attempts: 3,
            message: "connection refused".into(),
        });
        assert!(down.is_retryable());

        let throttled = TranslateError::Http {
            status: 429,
            body: String::new(),
        };
        assert!(throttled.is_retryable());

        let rejected = TranslateError::Http {
            status: 400,
            body: "bad lang".into(),
        };
        assert!(!rejected.is_retryable());

        assert!(!DashboardError::Validation("empty".into()).is_retryable());
        assert!(!DashboardError::UnknownState("XX".into()).is_retryable());
    }
}
