use super::error::FetchError;
use super::token::TokenProvider;
use super::ResponseFetcher;
use crate::response::ResponseTable;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// Worksheet name Google Forms creates for linked responses.
pub const DEFAULT_WORKSHEET: &str = "Form Responses 1";

/// Values-API response envelope. `values` is omitted entirely for an empty
/// sheet, hence the default.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Fetches the full response grid from the sheets values API. Read-only,
/// single-caller; every call returns a fresh snapshot of the whole table.
pub struct SheetsFetcher<T: TokenProvider> {
    client: Client,
    endpoint: Url,
    spreadsheet_id: String,
    multi_select: Vec<String>,
    tokens: T,
}

impl<T: TokenProvider> SheetsFetcher<T> {
    pub fn new(
        client: Client,
        spreadsheet_id: impl Into<String>,
        worksheet: &str,
        multi_select: Vec<String>,
        tokens: T,
    ) -> Result<Self, FetchError> {
        Self::with_base_url(
            client,
            DEFAULT_BASE_URL,
            spreadsheet_id,
            worksheet,
            multi_select,
            tokens,
        )
    }

    /// Same as `new` with an explicit API host, for pointing tests at a
    /// local server.
    pub fn with_base_url(
        client: Client,
        base_url: &str,
        spreadsheet_id: impl Into<String>,
        worksheet: &str,
        multi_select: Vec<String>,
        tokens: T,
    ) -> Result<Self, FetchError> {
        let spreadsheet_id = spreadsheet_id.into();
        let mut endpoint = Url::parse(base_url)
            .map_err(|e| FetchError::Malformed(format!("bad base url `{}`: {}", base_url, e)))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| FetchError::Malformed(format!("base url `{}` cannot be a base", base_url)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id.as_str(), "values", worksheet]);
        endpoint
            .query_pairs_mut()
            .append_pair("majorDimension", "ROWS");

        Ok(Self {
            client,
            endpoint,
            spreadsheet_id,
            multi_select,
            tokens,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl<T: TokenProvider> ResponseFetcher for SheetsFetcher<T> {
    async fn fetch(&mut self) -> Result<ResponseTable, FetchError> {
        let token = self.tokens.token()?;
        let resp = self
            .client
            .get(self.endpoint.clone())
            .bearer_auth(token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status, &self.spreadsheet_id, detail));
        }

        let body: ValueRange = resp
            .json()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        let grid: Vec<Vec<String>> = body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect();
        debug!(rows = grid.len().saturating_sub(1), "fetched response grid");

        Ok(ResponseTable::from_grid(grid, &self.multi_select))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::token::StaticToken;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// One-shot HTTP server: answers the first connection with the given
    /// status line and JSON body, and hands back the raw request it saw.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = sock.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).into_owned();
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            request
        });
        (base, server)
    }

    #[tokio::test]
    async fn fetch_parses_grid_and_sends_bearer_token() {
        let body = r#"{"range":"'Form Responses 1'!A1:D3","majorDimension":"ROWS",
            "values":[["Timestamp","Q1"],["11/15/2025 10:00:00","Beginner"],[null,4]]}"#;
        let (base, server) = serve_once("200 OK", body).await;

        let mut fetcher = SheetsFetcher::with_base_url(
            Client::new(),
            &base,
            "sheet-123",
            DEFAULT_WORKSHEET,
            vec![],
            StaticToken::new("t0ken"),
        )
        .unwrap();

        let table = fetcher.fetch().await.unwrap();
        assert_eq!(table.headers(), &["Timestamp".to_string(), "Q1".to_string()]);
        assert_eq!(table.len(), 2);
        assert!(table.rows()[0].submitted_at.is_some());
        // Null and numeric cells coerce the same way as in the grid parser.
        assert_eq!(table.rows()[1].answer("Q1").unwrap().display(), "4");

        let request = server.await.unwrap().to_lowercase();
        assert!(request.contains("authorization: bearer t0ken"));
        assert!(request.contains("/v4/spreadsheets/sheet-123/values/form%20responses%201"));
    }

    #[tokio::test]
    async fn fetch_of_empty_sheet_yields_empty_table() {
        // The values API omits `values` entirely when the sheet has no rows.
        let body = r#"{"range":"'Form Responses 1'!A1:Z1000","majorDimension":"ROWS"}"#;
        let (base, server) = serve_once("200 OK", body).await;

        let mut fetcher = SheetsFetcher::with_base_url(
            Client::new(),
            &base,
            "sheet-123",
            DEFAULT_WORKSHEET,
            vec![],
            StaticToken::new("t0ken"),
        )
        .unwrap();

        let table = fetcher.fetch().await.unwrap();
        assert!(table.is_empty());
        assert!(table.headers().is_empty());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn fetch_maps_missing_spreadsheet_to_not_found() {
        let (base, server) = serve_once("404 Not Found", r#"{"error":{"code":404}}"#).await;

        let mut fetcher = SheetsFetcher::with_base_url(
            Client::new(),
            &base,
            "gone-sheet",
            DEFAULT_WORKSHEET,
            vec![],
            StaticToken::new("t0ken"),
        )
        .unwrap();

        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { ref spreadsheet_id } if spreadsheet_id == "gone-sheet"));
        assert!(err.is_fatal());
        server.await.unwrap();
    }

    #[test]
    fn value_range_without_values_decodes_to_empty_grid() {
        let body: ValueRange =
            serde_json::from_str(r#"{"range":"'Form Responses 1'!A1:Z1000","majorDimension":"ROWS"}"#)
                .unwrap();
        assert!(body.values.is_empty());
    }

    #[test]
    fn endpoint_encodes_worksheet_name() {
        let fetcher = SheetsFetcher::new(
            Client::new(),
            "sheet-123",
            DEFAULT_WORKSHEET,
            vec![],
            StaticToken::new("t"),
        )
        .unwrap();
        assert_eq!(
            fetcher.endpoint().as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-123/values/Form%20Responses%201?majorDimension=ROWS"
        );
    }

    #[test]
    fn cells_coerce_to_strings() {
        assert_eq!(cell_to_string(Value::String("yes".into())), "yes");
        assert_eq!(cell_to_string(Value::Null), "");
        assert_eq!(cell_to_string(serde_json::json!(4)), "4");
        assert_eq!(cell_to_string(serde_json::json!(true)), "true");
    }

    #[test]
    fn rejects_unusable_base_url() {
        let res = SheetsFetcher::with_base_url(
            Client::new(),
            "not a url",
            "sheet",
            DEFAULT_WORKSHEET,
            vec![],
            StaticToken::new("t"),
        );
        assert!(matches!(res, Err(FetchError::Malformed(_))));
    }
}
