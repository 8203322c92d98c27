//! InfluxDB 2.x adapter
//!
//! Writes go to `/api/v2/write` as line protocol with millisecond precision,
//! resume queries go to `/api/v2/query` as Flux and come back as CSV.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

use super::line_protocol::encode_point;
use super::{LastPointQuery, Point, StoreError, StoreResult, TimeSeriesStore, WriteSession};
use crate::fetcher::shared_resources::global_http_client;

/// InfluxDB connection
#[derive(Clone)]
pub struct InfluxStore {
    client: Arc<Client>,
    url: String,
    org: String,
    token: String,
}

impl InfluxStore {
    /// Create a store using the global HTTP client
    pub fn new(url: impl Into<String>, org: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(global_http_client(), url, org, token)
    }

    /// Create a store with a custom HTTP client
    pub fn with_client(
        client: Arc<Client>,
        url: impl Into<String>,
        org: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
            org: org.into(),
            token: token.into(),
        }
    }

    /// Base URL of the server
    pub fn url(&self) -> &str {
        &self.url
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }
}

#[async_trait]
impl TimeSeriesStore for InfluxStore {
    async fn query_last(&self, query: &LastPointQuery) -> StoreResult<Option<i64>> {
        let flux = build_last_point_flux(query);
        debug!(bucket = %query.bucket, "Querying last point:\n{}", flux);

        let response = self
            .client
            .post(format!("{}/api/v2/query", self.url))
            .query(&[("org", self.org.as_str())])
            .header(AUTHORIZATION, self.auth_header())
            .header(CONTENT_TYPE, "application/vnd.flux")
            .header(ACCEPT, "application/csv")
            .body(flux)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(StoreError::from_status(status.as_u16(), body));
        }

        parse_last_time(&body)
    }

    fn open_session(&self, bucket: &str) -> Box<dyn WriteSession> {
        Box::new(InfluxWriteSession {
            client: self.client.clone(),
            write_url: format!("{}/api/v2/write", self.url),
            org: self.org.clone(),
            bucket: bucket.to_string(),
            auth: self.auth_header(),
            lines: Vec::new(),
            closed: false,
        })
    }
}

/// Buffered write session for one bucket
pub struct InfluxWriteSession {
    client: Arc<Client>,
    write_url: String,
    org: String,
    bucket: String,
    auth: String,
    lines: Vec<String>,
    closed: bool,
}

#[async_trait]
impl WriteSession for InfluxWriteSession {
    fn write_point(&mut self, point: Point) {
        if self.closed {
            return;
        }
        if let Some(line) = encode_point(&point) {
            self.lines.push(line);
        }
    }

    fn pending(&self) -> usize {
        self.lines.len()
    }

    async fn flush(&mut self) -> StoreResult<usize> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if self.lines.is_empty() {
            return Ok(0);
        }

        let lines = std::mem::take(&mut self.lines);
        let count = lines.len();

        let response = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ms"),
            ])
            .header(AUTHORIZATION, self.auth.as_str())
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(lines.join("\n"))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::from_status(status.as_u16(), body));
        }

        debug!(bucket = %self.bucket, points = count, "Batch written");
        Ok(count)
    }

    async fn close(&mut self) -> StoreResult<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.flush().await.map(|_| ());
        self.closed = true;
        result
    }
}

/// Build the Flux query selecting the last matching point
pub fn build_last_point_flux(query: &LastPointQuery) -> String {
    let start = DateTime::<Utc>::from_timestamp_millis(query.range_start)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Secs, true);

    format!(
        "from(bucket: \"{bucket}\")\n  |> range(start: {start})\n  |> filter(fn: (r) => r._measurement == \"{measurement}\" and r.{exchange_tag} == \"{exchange}\" and r.{symbol_tag} == \"{symbol}\" and r.{tf_tag} == \"{tf}\" and r._field == \"{field}\")\n  |> last()",
        bucket = escape_flux(&query.bucket),
        measurement = escape_flux(&query.measurement),
        exchange_tag = super::TAG_EXCHANGE,
        exchange = escape_flux(&query.exchange),
        symbol_tag = super::TAG_SYMBOL,
        symbol = escape_flux(&query.symbol),
        tf_tag = super::TAG_TIMEFRAME,
        tf = query.timeframe,
        field = escape_flux(&query.field),
    )
}

fn escape_flux(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Extract the latest `_time` value from a Flux CSV response
///
/// Handles both annotated (`#datatype,...` rows) and plain CSV, and multiple
/// tables separated by blank lines each with their own header row.
pub fn parse_last_time(body: &str) -> StoreResult<Option<i64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(body.as_bytes());

    let mut time_column = None;
    let mut latest: Option<i64> = None;

    for result in reader.records() {
        let record = result.map_err(|e| StoreError::Parse(format!("invalid CSV: {e}")))?;

        if let Some(idx) = record.iter().position(|field| field == "_time") {
            time_column = Some(idx);
            continue;
        }

        let Some(idx) = time_column else {
            continue;
        };
        let raw = match record.get(idx) {
            Some(raw) if !raw.trim().is_empty() => raw.trim(),
            _ => continue,
        };

        let ts = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| StoreError::Parse(format!("invalid _time '{raw}': {e}")))?
            .timestamp_millis();
        latest = Some(latest.map_or(ts, |current| current.max(ts)));
    }

    Ok(latest)
}
