use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::google_auth::{SheetsCredentials, TokenSource};
use super::{Table, TableStore};
use crate::error::AppError;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub worksheet: String,
    pub credentials: SheetsCredentials,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct UpdateValuesRequest<'a> {
    range: &'a str,
    #[serde(rename = "majorDimension")]
    major_dimension: &'static str,
    values: &'a Table,
}

/// One worksheet of a Google spreadsheet, addressed through the Sheets v4 values API.
pub struct SheetsTableStore {
    client: Client,
    auth: TokenSource,
    config: SheetsConfig,
}

impl SheetsTableStore {
    pub fn new(config: SheetsConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        let auth = TokenSource::from_credentials(&config.credentials, client.clone())?;
        Ok(Self { client, auth, config })
    }

    fn values_url(&self, suffix: &str) -> Result<Url, AppError> {
        let mut url = Url::parse(SHEETS_API_BASE)
            .map_err(|e| AppError::Config(format!("Invalid Sheets API url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Config("Sheets API url cannot be a base".to_string()))?
            .push(&self.config.spreadsheet_id)
            .push("values")
            .push(&format!("{}{}", self.config.worksheet, suffix));
        Ok(url)
    }

    async fn check(&self, response: Response, action: &str) -> Result<Response, AppError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::StoreUnavailable(format!(
            "Sheets API error while {} {}: {} {}",
            action, self.config.worksheet, status, body
        )))
    }
}

#[async_trait]
impl TableStore for SheetsTableStore {
    fn name(&self) -> &str {
        "google-sheets"
    }

    async fn read_table(&self) -> Result<Table, AppError> {
        let url = self.values_url("")?;
        let response = self
            .client
            .get(url)
            .bearer_auth(self.auth.access_token().await?)
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("Sheets request failed: {}", e)))?;
        let response = self.check(response, "reading").await?;

        let body_text = response.text().await?;
        let parsed: ValueRange = serde_json::from_str(&body_text).map_err(|e| {
            tracing::error!("Failed to parse Sheets response: {}", e);
            AppError::StoreUnavailable(format!("Failed to parse Sheets response: {}", e))
        })?;

        Ok(parsed
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn overwrite_table(&self, table: &Table) -> Result<(), AppError> {
        let clear_url = self.values_url(":clear")?;
        let response = self
            .client
            .post(clear_url)
            .bearer_auth(self.auth.access_token().await?)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("Sheets request failed: {}", e)))?;
        self.check(response, "clearing").await?;

        if table.is_empty() {
            return Ok(());
        }

        let mut update_url = self.values_url("")?;
        // RAW keeps the checklist JSON and ids exactly as written.
        update_url
            .query_pairs_mut()
            .append_pair("valueInputOption", "RAW");
        let request_body = UpdateValuesRequest {
            range: &self.config.worksheet,
            major_dimension: "ROWS",
            values: table,
        };

        let response = self
            .client
            .put(update_url)
            .bearer_auth(self.auth.access_token().await?)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("Sheets request failed: {}", e)))?;
        self.check(response, "writing").await?;

        tracing::info!(
            "Wrote {} rows to worksheet {}",
            table.len(),
            self.config.worksheet
        );
        Ok(())
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(worksheet: &str) -> SheetsTableStore {
        SheetsTableStore::new(SheetsConfig {
            spreadsheet_id: "abc123".to_string(),
            worksheet: worksheet.to_string(),
            credentials: SheetsCredentials::AccessToken("token".to_string()),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn values_url_escapes_worksheet_name() {
        let url = store("Task Database").values_url(":clear").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/Task%20Database:clear"
        );
    }

    #[test]
    fn value_range_without_values_is_empty() {
        let parsed: ValueRange =
            serde_json::from_str(r#"{"range": "Sheet1!A1:Z1000", "majorDimension": "ROWS"}"#).unwrap();
        assert!(parsed.values.is_empty());
    }

    #[test]
    fn non_string_cells_become_text() {
        assert_eq!(cell_text(serde_json::json!(1717000000)), "1717000000");
        assert_eq!(cell_text(serde_json::json!(true)), "true");
        assert_eq!(cell_text(Value::Null), "");
    }
}
