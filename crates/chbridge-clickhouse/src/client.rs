//! ClickHouse HTTP interface client.
//!
//! Statements are POSTed as the request body. Queries ask for
//! `JSONCompactEachRow` output and are read line by line, so a result set is
//! never buffered in full.
//!
//! The configured timeout bounds connecting and each individual read, so a
//! stalled server is detected but a long stream that keeps producing rows is
//! never cut off. A [`QueryContext`] timeout is a deadline for `exec` only.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use chbridge_model::{RawValue, TransferValue};
use chbridge_pipeline::{Connection, ConnectionError, QueryContext, RowCursor};
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::USER_AGENT;
use tracing::debug;

use crate::bind::bind;
use crate::config::ClickHouseConfig;
use crate::error::{ClientError, Result, transport};
use crate::rows::{RESULT_FORMAT, parse_row, server_exception};

const HEADER_USER: &str = "X-ClickHouse-User";
const HEADER_KEY: &str = "X-ClickHouse-Key";
const HEADER_DATABASE: &str = "X-ClickHouse-Database";
const HEADER_EXCEPTION_CODE: &str = "X-ClickHouse-Exception-Code";

/// A connection to one ClickHouse server and database.
pub struct ClickHouseClient {
    client: Client,
    base_url: Url,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Build a client without contacting the server.
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        let address = config.base_url();
        let base_url = Url::parse(&address).map_err(|err| ClientError::InvalidAddress {
            address: address.clone(),
            reason: err.to_string(),
        })?;
        // The blocking client applies this per read, not to the whole body.
        let client = Client::builder()
            .connect_timeout(config.timeout())
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    /// Build a client and check that the server answers.
    pub fn connect(config: ClickHouseConfig) -> Result<Self> {
        let client = Self::new(config)?;
        client.ping().map_err(|source| ClientError::Unreachable {
            address: client.base_url.to_string(),
            source,
        })?;
        debug!(
            address = %client.base_url,
            database = %client.config.database,
            "connected to ClickHouse"
        );
        Ok(client)
    }

    #[must_use]
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    /// Health check against `/ping`.
    pub fn ping(&self) -> std::result::Result<(), ConnectionError> {
        let url = self
            .base_url
            .join("ping")
            .map_err(|err| ConnectionError::Protocol(err.to_string()))?;
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent())
            .send()
            .map_err(|err| transport(&err))?;
        check_status(response).map(drop)
    }

    fn statement(
        &self,
        context: &QueryContext,
        body: String,
        deadline: Option<Duration>,
    ) -> RequestBuilder {
        let mut url = self.base_url.clone();
        if let Some(query_id) = &context.query_id {
            url.query_pairs_mut().append_pair("query_id", query_id);
        }
        let mut request = self
            .client
            .post(url)
            .header(USER_AGENT, user_agent())
            .header(HEADER_USER, self.config.user.as_str())
            .header(HEADER_DATABASE, self.config.database.as_str())
            .body(body);
        if !self.config.password.is_empty() {
            request = request.header(HEADER_KEY, self.config.password.as_str());
        }
        if let Some(deadline) = deadline {
            request = request.timeout(deadline);
        }
        request
    }

    fn send(
        &self,
        context: &QueryContext,
        body: String,
        deadline: Option<Duration>,
    ) -> std::result::Result<Response, ConnectionError> {
        debug!(
            bytes = body.len(),
            query_id = context.query_id.as_deref().unwrap_or_default(),
            "sending statement"
        );
        let response = self
            .statement(context, body, deadline)
            .send()
            .map_err(|err| transport(&err))?;
        check_status(response)
    }
}

impl Connection for ClickHouseClient {
    fn query(
        &self,
        context: &QueryContext,
        sql: &str,
        params: &[TransferValue],
    ) -> std::result::Result<Box<dyn RowCursor + '_>, ConnectionError> {
        let bound = bind(sql, params)?;
        let body = format!(
            "{} FORMAT {RESULT_FORMAT}",
            bound.trim_end().trim_end_matches(';')
        );
        // No total deadline: it would also cover the streamed body.
        let response = self.send(context, body, None)?;
        Ok(Box::new(HttpCursor {
            reader: BufReader::new(response),
            line: String::new(),
        }))
    }

    fn exec(
        &self,
        context: &QueryContext,
        sql: &str,
        params: &[TransferValue],
    ) -> std::result::Result<(), ConnectionError> {
        let body = bind(sql, params)?;
        let response = self.send(context, body, context.timeout)?;
        // Drain so the server-side exception text, if any, is seen.
        let text = response.text().map_err(|err| transport(&err))?;
        match server_exception(&text) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Streaming cursor over a `JSONCompactEachRow` response body.
struct HttpCursor {
    reader: BufReader<Response>,
    line: String,
}

impl RowCursor for HttpCursor {
    fn next_row(&mut self) -> std::result::Result<Option<Vec<RawValue>>, ConnectionError> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .map_err(|err| ConnectionError::Transport(format!("reading result stream: {err}")))?;
            if read == 0 {
                return Ok(None);
            }
            let line = self.line.trim_end();
            if !line.is_empty() {
                return parse_row(line).map(Some);
            }
        }
    }
}

fn user_agent() -> String {
    format!("chbridge/{}", env!("CARGO_PKG_VERSION"))
}

/// Turn a non-success response into a server error.
fn check_status(response: Response) -> std::result::Result<Response, ConnectionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let header_code = response
        .headers()
        .get(HEADER_EXCEPTION_CODE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u32>().ok());
    let body = response
        .text()
        .unwrap_or_else(|_| format!("HTTP status {status}"));
    let message = body.trim();
    let message = if message.is_empty() {
        format!("HTTP status {status}")
    } else {
        message.to_string()
    };
    let code = header_code.or_else(|| match server_exception(&message) {
        Some(ConnectionError::Server { code, .. }) => code,
        _ => None,
    });
    Err(ConnectionError::Server { code, message })
}
