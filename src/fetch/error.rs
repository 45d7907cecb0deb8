use reqwest::StatusCode;
use thiserror::Error;

/// Failure classes for a sheet fetch. `Auth` and `NotFound` are fatal: the
/// upstream will keep rejecting the same request, so the refresh loop stops
/// immediately instead of spending its error budget. Everything else is
/// transient and retried on the next tick.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("credentials rejected by the sheets service ({status}): {detail}")]
    Auth { status: StatusCode, detail: String },

    #[error("spreadsheet `{spreadsheet_id}` not found")]
    NotFound { spreadsheet_id: String },

    /// Upstream quota exhausted. The observed bound is 100 requests per 100
    /// seconds per credential; a normal refresh interval sits well under it.
    #[error("rate limited by the sheets service: {detail}")]
    RateLimit { detail: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("unexpected upstream status {0}")]
    Upstream(StatusCode),

    #[error("malformed response body: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Fatal errors are surfaced to the operator immediately; the loop does
    /// not retry them.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Auth { .. } | FetchError::NotFound { .. })
    }

    /// Classify a non-success HTTP status from the sheets service.
    pub fn from_status(status: StatusCode, spreadsheet_id: &str, detail: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Auth { status, detail },
            StatusCode::NOT_FOUND => FetchError::NotFound {
                spreadsheet_id: spreadsheet_id.to_string(),
            },
            StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimit { detail },
            _ => FetchError::Upstream(status),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        let auth = FetchError::from_status(StatusCode::FORBIDDEN, "sheet", "denied".into());
        assert!(matches!(auth, FetchError::Auth { .. }));
        assert!(auth.is_fatal());

        let missing = FetchError::from_status(StatusCode::NOT_FOUND, "sheet", String::new());
        assert!(matches!(missing, FetchError::NotFound { .. }));
        assert!(missing.is_fatal());

        let limited =
            FetchError::from_status(StatusCode::TOO_MANY_REQUESTS, "sheet", "quota".into());
        assert!(matches!(limited, FetchError::RateLimit { .. }));
        assert!(!limited.is_fatal());

        let upstream = FetchError::from_status(StatusCode::BAD_GATEWAY, "sheet", String::new());
        assert!(matches!(upstream, FetchError::Upstream(_)));
        assert!(!upstream.is_fatal());
    }

    #[test]
    fn transient_classes_are_not_fatal() {
        assert!(!FetchError::Transport("reset".into()).is_fatal());
        assert!(!FetchError::Malformed("no grid".into()).is_fatal());
    }
}
