pub mod error;
pub mod sheets;
pub mod token;

pub use error::FetchError;
pub use sheets::{SheetsFetcher, DEFAULT_WORKSHEET};
pub use token::{StaticToken, TokenFile, TokenProvider};

use crate::response::ResponseTable;
use std::future::Future;

/// Point-in-time read of the full response table. Single-caller usage is
/// assumed; implementations need no concurrent-call safety.
pub trait ResponseFetcher {
    fn fetch(&mut self) -> impl Future<Output = Result<ResponseTable, FetchError>> + Send;
}
