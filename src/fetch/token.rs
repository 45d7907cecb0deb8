use super::error::FetchError;
use reqwest::StatusCode;
use std::fs;
use std::path::PathBuf;

/// Produces valid, currently-authorized bearer material on demand. How the
/// token came to exist (service-account exchange, secret-scope lookup, a
/// human pasting one) is entirely the caller's business.
pub trait TokenProvider: Send {
    fn token(&self) -> Result<String, FetchError>;
}

/// Fixed token handed over at construction.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Result<String, FetchError> {
        Ok(self.0.clone())
    }
}

/// Reads the token from a file on every call, so an operator can rotate the
/// token mid-run by rewriting the file. A missing or empty file counts as an
/// auth failure, not a transport one.
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenProvider for TokenFile {
    fn token(&self) -> Result<String, FetchError> {
        let raw = fs::read_to_string(&self.path).map_err(|e| FetchError::Auth {
            status: StatusCode::UNAUTHORIZED,
            detail: format!("cannot read token file `{}`: {}", self.path.display(), e),
        })?;
        let token = raw.trim();
        if token.is_empty() {
            return Err(FetchError::Auth {
                status: StatusCode::UNAUTHORIZED,
                detail: format!("token file `{}` is empty", self.path.display()),
            });
        }
        Ok(token.to_string())
    }
}
