use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::auth::AuthProvider;
use crate::core::batch::CellUpdate;
use crate::core::upload::{BackendError, SpreadsheetBackend, Worksheet};

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

/// How the Sheets API should interpret the uploaded strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInputOption {
    /// Parsed as if typed into the UI: numbers, dates and formulas are recognised.
    UserEntered,
    /// Stored verbatim as text.
    Raw,
}

impl ValueInputOption {
    fn as_str(&self) -> &'static str {
        match self {
            ValueInputOption::UserEntered => "USER_ENTERED",
            ValueInputOption::Raw => "RAW",
        }
    }
}

/// Google Sheets v4 REST client bound to one spreadsheet document.
pub struct SheetsApiClient<A: AuthProvider> {
    client: Client,
    auth: A,
    base_url: String,
    spreadsheet_id: String,
    value_input: ValueInputOption,
}

impl<A: AuthProvider> SheetsApiClient<A> {
    pub fn new(
        client: Client,
        auth: A,
        spreadsheet_id: impl Into<String>,
        value_input: ValueInputOption,
    ) -> Self {
        Self {
            client,
            auth,
            base_url: SHEETS_API_BASE.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            value_input,
        }
    }

    /// Points the client at a local fake API root.
    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/spreadsheets/{}", self.base_url, self.spreadsheet_id)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let token = self.auth.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api { status, body });
        }

        Ok(response)
    }

    async fn batch_update(&self, requests: Value) -> Result<(), BackendError> {
        let url = format!("{}:batchUpdate", self.spreadsheet_url());
        self.send(self.client.post(url).json(&json!({ "requests": requests })))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<A: AuthProvider> SpreadsheetBackend for SheetsApiClient<A> {
    async fn list_worksheets(&self, title: Option<&str>) -> Result<Vec<Worksheet>, BackendError> {
        tracing::debug!(spreadsheet = %self.spreadsheet_id, "Listing worksheets");

        let response = self
            .send(self.client.get(self.spreadsheet_url()).query(&[(
                "fields",
                "sheets.properties(sheetId,title,index,gridProperties(rowCount,columnCount))",
            )]))
            .await?;

        let spreadsheet: ApiSpreadsheet = response
            .json()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let mut worksheets: Vec<Worksheet> = spreadsheet
            .sheets
            .into_iter()
            .map(|sheet| map_worksheet(sheet.properties))
            .filter(|w| title.map_or(true, |t| w.title == t))
            .collect();
        worksheets.sort_by_key(|w| w.index);
        Ok(worksheets)
    }

    async fn create_worksheet(
        &self,
        title: &str,
        rows: usize,
        cols: usize,
    ) -> Result<(), BackendError> {
        tracing::debug!(worksheet = %title, rows, cols, "Adding worksheet");
        self.batch_update(json!([{
            "addSheet": {
                "properties": {
                    "title": title,
                    "gridProperties": { "rowCount": rows, "columnCount": cols }
                }
            }
        }]))
        .await
    }

    async fn resize_worksheet(
        &self,
        worksheet: &Worksheet,
        rows: usize,
        cols: usize,
    ) -> Result<(), BackendError> {
        self.batch_update(json!([{
            "updateSheetProperties": {
                "properties": {
                    "sheetId": worksheet.sheet_id,
                    "gridProperties": { "rowCount": rows, "columnCount": cols }
                },
                "fields": "gridProperties.rowCount,gridProperties.columnCount"
            }
        }]))
        .await
    }

    async fn update_cells(
        &self,
        worksheet: &Worksheet,
        updates: &[CellUpdate],
    ) -> Result<(), BackendError> {
        if updates.is_empty() {
            return Ok(());
        }

        let body = json!({
            "valueInputOption": self.value_input.as_str(),
            "data": [{
                "range": format!("{}!A1", quote_sheet_title(&worksheet.title)),
                "majorDimension": "ROWS",
                "values": dense_rows(updates),
            }],
        });

        tracing::debug!(
            worksheet = %worksheet.title,
            cells = updates.len(),
            "Submitting cell batch"
        );
        let url = format!("{}/values:batchUpdate", self.spreadsheet_url());
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL, or accepts a bare ID.
pub fn extract_spreadsheet_id(url_or_id: &str) -> Option<String> {
    let url_or_id = url_or_id.trim();
    if url_or_id.contains("docs.google.com") {
        if let Some(start) = url_or_id.find("/spreadsheets/d/") {
            let after_d = &url_or_id[start + "/spreadsheets/d/".len()..];
            let end = after_d
                .find(|c| c == '/' || c == '?' || c == '#')
                .unwrap_or(after_d.len());
            let id = &after_d[..end];
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    } else if !url_or_id.is_empty() && !url_or_id.contains('/') && !url_or_id.contains(' ') {
        return Some(url_or_id.to_string());
    }
    None
}

/// Quotes a title for A1 notation: `it's` becomes `'it''s'`.
fn quote_sheet_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Lays the updates out as a row-major matrix anchored at A1. Positions without an
/// update are written as empty strings.
fn dense_rows(updates: &[CellUpdate]) -> Vec<Vec<String>> {
    let rows = updates.iter().map(|u| u.row).max().unwrap_or(0);
    let cols = updates.iter().map(|u| u.col).max().unwrap_or(0);

    let mut matrix = vec![vec![String::new(); cols]; rows];
    for update in updates {
        if update.row == 0 || update.col == 0 {
            continue;
        }
        matrix[update.row - 1][update.col - 1] = update.value.clone();
    }
    matrix
}

fn map_worksheet(properties: ApiSheetProperties) -> Worksheet {
    let grid = properties.grid_properties.unwrap_or_default();
    Worksheet {
        sheet_id: properties.sheet_id,
        title: properties.title,
        index: properties.index,
        row_count: grid.row_count.unwrap_or(0),
        col_count: grid.column_count.unwrap_or(0),
    }
}

#[derive(Debug, Deserialize)]
struct ApiSpreadsheet {
    #[serde(default)]
    sheets: Vec<ApiSheet>,
}

#[derive(Debug, Deserialize)]
struct ApiSheet {
    properties: ApiSheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
    #[serde(default)]
    index: usize,
    grid_properties: Option<ApiGridProperties>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGridProperties {
    row_count: Option<usize>,
    column_count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::AuthError;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    struct StaticToken;

    #[async_trait]
    impl AuthProvider for StaticToken {
        async fn access_token(&self) -> Result<String, AuthError> {
            Ok("test-token".to_string())
        }
    }

    #[test]
    fn test_extract_spreadsheet_id_from_url() {
        let url = "https://docs.google.com/spreadsheets/d/1abcXYZ_-42/edit#gid=0";
        assert_eq!(
            extract_spreadsheet_id(url),
            Some("1abcXYZ_-42".to_string())
        );
    }

    #[test]
    fn test_extract_spreadsheet_id_from_id() {
        assert_eq!(
            extract_spreadsheet_id("1abcXYZ_-42"),
            Some("1abcXYZ_-42".to_string())
        );
        assert_eq!(extract_spreadsheet_id("not an id"), None);
        assert_eq!(extract_spreadsheet_id(""), None);
    }

    #[test]
    fn sheet_titles_are_quoted_for_a1_ranges() {
        assert_eq!(quote_sheet_title("Data"), "'Data'");
        assert_eq!(quote_sheet_title("Bob's list"), "'Bob''s list'");
    }

    #[test]
    fn dense_rows_fill_gaps_with_empty_strings() {
        let rows = dense_rows(&[
            CellUpdate::new(1, 1, "a"),
            CellUpdate::new(2, 3, "z"),
        ]);
        assert_eq!(
            rows,
            vec![
                vec!["a".to_string(), String::new(), String::new()],
                vec![String::new(), String::new(), "z".to_string()],
            ]
        );
    }

    #[test]
    fn worksheet_properties_are_mapped() {
        let spreadsheet: ApiSpreadsheet = serde_json::from_str(
            r#"{"sheets": [
                {"properties": {"sheetId": 7, "title": "Second", "index": 1,
                    "gridProperties": {"rowCount": 10, "columnCount": 3}}},
                {"properties": {"title": "First"}}
            ]}"#,
        )
        .unwrap();

        let worksheets: Vec<Worksheet> = spreadsheet
            .sheets
            .into_iter()
            .map(|s| map_worksheet(s.properties))
            .collect();

        assert_eq!(
            worksheets[0],
            Worksheet {
                sheet_id: 7,
                title: "Second".to_string(),
                index: 1,
                row_count: 10,
                col_count: 3,
            }
        );
        assert_eq!(worksheets[1].sheet_id, 0);
        assert_eq!(worksheets[1].index, 0);
    }

    /// Serves canned JSON responses in order and records the raw requests.
    async fn fake_api(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let request = read_request(&mut stream).await;
                recorder.lock().unwrap().push(request);
                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.unwrap();
            }
        });

        (base_url, seen)
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let read = stream.read(&mut chunk).await.unwrap();
            if read == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..read]);

            let text = String::from_utf8_lossy(&raw).into_owned();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if raw.len() >= header_end + 4 + content_length {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    fn client_for(base_url: String) -> SheetsApiClient<StaticToken> {
        SheetsApiClient::new(
            Client::new(),
            StaticToken,
            "doc-1",
            ValueInputOption::UserEntered,
        )
        .with_base_url(base_url)
    }

    #[tokio::test]
    async fn lists_worksheets_in_document_order_filtered_by_title() {
        let (base_url, seen) = fake_api(vec![(
            200,
            r#"{"sheets": [
                {"properties": {"sheetId": 2, "title": "B", "index": 1}},
                {"properties": {"sheetId": 1, "title": "A", "index": 0}}
            ]}"#,
        )])
        .await;
        let client = client_for(base_url);

        let all = client.list_worksheets(None).await.unwrap();
        assert_eq!(
            all.iter().map(|w| w.title.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );

        let request = seen.lock().unwrap()[0].clone();
        assert!(request.starts_with("GET /spreadsheets/doc-1?fields="));
        assert!(request.to_lowercase().contains("authorization: bearer test-token"));
    }

    #[tokio::test]
    async fn cell_batch_is_one_dense_range() {
        let (base_url, seen) = fake_api(vec![(200, "{}")]).await;
        let client = client_for(base_url);
        let worksheet = Worksheet {
            sheet_id: 3,
            title: "Data".to_string(),
            index: 0,
            row_count: 2,
            col_count: 2,
        };

        client
            .update_cells(
                &worksheet,
                &[
                    CellUpdate::new(1, 1, "a"),
                    CellUpdate::new(1, 2, "b"),
                    CellUpdate::new(2, 1, "c"),
                    CellUpdate::new(2, 2, ""),
                ],
            )
            .await
            .unwrap();

        let request = seen.lock().unwrap()[0].clone();
        assert!(request.starts_with("POST /spreadsheets/doc-1/values:batchUpdate"));
        let body: Value = serde_json::from_str(request.split("\r\n\r\n").nth(1).unwrap()).unwrap();
        assert_eq!(body["valueInputOption"], "USER_ENTERED");
        assert_eq!(body["data"][0]["range"], "'Data'!A1");
        assert_eq!(body["data"][0]["values"], json!([["a", "b"], ["c", ""]]));
    }

    #[tokio::test]
    async fn resize_targets_the_sheet_id() {
        let (base_url, seen) = fake_api(vec![(200, "{}")]).await;
        let client = client_for(base_url);
        let worksheet = Worksheet {
            sheet_id: 99,
            title: "Data".to_string(),
            index: 0,
            row_count: 1000,
            col_count: 26,
        };

        client.resize_worksheet(&worksheet, 4, 2).await.unwrap();

        let request = seen.lock().unwrap()[0].clone();
        assert!(request.starts_with("POST /spreadsheets/doc-1:batchUpdate"));
        let body: Value = serde_json::from_str(request.split("\r\n\r\n").nth(1).unwrap()).unwrap();
        let properties = &body["requests"][0]["updateSheetProperties"]["properties"];
        assert_eq!(properties["sheetId"], 99);
        assert_eq!(properties["gridProperties"]["rowCount"], 4);
        assert_eq!(properties["gridProperties"]["columnCount"], 2);
    }

    #[tokio::test]
    async fn api_errors_carry_status_and_body() {
        let (base_url, _) = fake_api(vec![(
            403,
            r#"{"error": {"message": "The caller does not have permission"}}"#,
        )])
        .await;
        let client = client_for(base_url);

        let err = client.create_worksheet("New", 1, 1).await.unwrap_err();
        match err {
            BackendError::Api { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("does not have permission"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
