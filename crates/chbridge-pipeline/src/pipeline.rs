//! Transfer orchestration.
//!
//! A run validates the request, resolves the database side's catalog types,
//! maps the requested columns to a fixed plan and then streams rows through
//! the codec until the source is exhausted or the first error occurs.
//! Nothing already written or inserted is rolled back.

use std::time::Instant;

use chbridge_model::{
    CatalogColumn, ColumnSpec, Direction, Endpoint, IngestionRequest, IngestionResult,
    PreviewRequest, PreviewResult, RawValue, TransferValue,
};
use tracing::{debug, info, info_span, warn};

use crate::batch::{BatchInserter, CsvBatchReader, CsvBatchWriter};
use crate::codec::RowCodec;
use crate::connection::{Connection, ConnectionHandle, RowCursor};
use crate::error::{BridgeError, ConnectionError, Result};
use crate::options::{PREVIEW_ROW_LIMIT, TransferOptions};
use crate::resolver::TypeResolver;
use crate::sql::{InsertStatement, SHOW_TABLES, select_statement};
use crate::storage::{FileStorage, LocalStorage};

/// Stage of a transfer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Validating,
    Resolving,
    Mapping,
    Streaming,
    Completed,
    Failed,
}

impl PipelineState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Resolving => "resolving",
            Self::Mapping => "mapping",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

struct Transitions<'o> {
    observer: &'o mut dyn FnMut(PipelineState),
}

impl Transitions<'_> {
    fn enter(&mut self, state: PipelineState) {
        debug!(state = state.as_str(), "pipeline state");
        (self.observer)(state);
    }
}

/// Runs transfers and previews against one connection and one storage.
pub struct IngestionPipeline<S: FileStorage = LocalStorage> {
    handle: ConnectionHandle,
    storage: S,
    options: TransferOptions,
}

impl IngestionPipeline<LocalStorage> {
    /// Pipeline over the local filesystem, using paths as given.
    #[must_use]
    pub fn local(handle: ConnectionHandle) -> Self {
        Self::new(handle, LocalStorage::new())
    }
}

impl<S: FileStorage> IngestionPipeline<S> {
    pub fn new(handle: ConnectionHandle, storage: S) -> Self {
        Self {
            handle,
            storage,
            options: TransferOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Run a transfer to completion.
    pub fn run(&self, request: &IngestionRequest) -> Result<IngestionResult> {
        self.run_observed(request, &mut |_| {})
    }

    /// Run a transfer, reporting every state entered to `observer`.
    ///
    /// The last state reported is always `Completed` or `Failed`.
    pub fn run_observed(
        &self,
        request: &IngestionRequest,
        observer: &mut dyn FnMut(PipelineState),
    ) -> Result<IngestionResult> {
        let span = info_span!(
            "ingestion",
            source = %request.source,
            target = %request.target,
            table = %request.table,
        );
        let _guard = span.enter();
        let started = Instant::now();
        let mut transitions = Transitions { observer };

        match self.execute(request, &mut transitions) {
            Ok(record_count) => {
                transitions.enter(PipelineState::Completed);
                info!(
                    records = record_count,
                    output = %request.output,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "transfer completed"
                );
                Ok(IngestionResult { record_count })
            }
            Err(err) => {
                transitions.enter(PipelineState::Failed);
                warn!(
                    kind = %err.kind(),
                    error = %err,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "transfer failed"
                );
                Err(err)
            }
        }
    }

    fn execute(&self, request: &IngestionRequest, transitions: &mut Transitions<'_>) -> Result<u64> {
        transitions.enter(PipelineState::Validating);
        let direction = validate(request)?;
        let connection = self.handle.get()?;
        match direction {
            Direction::Export => self.export(connection, request, transitions),
            Direction::Ingest => self.ingest(connection, request, transitions),
        }
    }

    fn export(
        &self,
        connection: &dyn Connection,
        request: &IngestionRequest,
        transitions: &mut Transitions<'_>,
    ) -> Result<u64> {
        let context = &self.options.context;

        transitions.enter(PipelineState::Resolving);
        let schema = TypeResolver::new(connection, context).describe(&request.table)?;

        transitions.enter(PipelineState::Mapping);
        let plan = schema.plan(&request.columns)?;
        debug!(columns = ?request.columns, "export plan built");

        transitions.enter(PipelineState::Streaming);
        let sql = select_statement(&request.table, &plan, None);
        let mut cursor = connection
            .query(context, &sql, &[])
            .map_err(BridgeError::Query)?;
        let sink = self
            .storage
            .create(&request.output)
            .map_err(|err| BridgeError::io("create", &request.output, err))?;
        let mut writer =
            CsvBatchWriter::new(sink, &request.output, &request.columns, self.options.csv)?
                .with_batch_size(self.options.batch_size);

        let streamed = copy_rows(cursor.as_mut(), &plan, |values| writer.write_row(&values));
        // The sink is flushed on every path; a streaming error takes precedence.
        let finished = writer.finish();
        streamed?;
        finished
    }

    fn ingest(
        &self,
        connection: &dyn Connection,
        request: &IngestionRequest,
        transitions: &mut Transitions<'_>,
    ) -> Result<u64> {
        let context = &self.options.context;

        transitions.enter(PipelineState::Resolving);
        let schema = TypeResolver::new(connection, context).describe(&request.output)?;

        transitions.enter(PipelineState::Mapping);
        let plan = schema.plan(&request.columns)?;
        let source = self
            .storage
            .open(&request.table)
            .map_err(|err| BridgeError::io("open", self.storage.resolve(&request.table), err))?;
        let mut reader = CsvBatchReader::open(source, request.table.as_str(), self.options.csv)?
            .select(&plan)?
            .with_codec(RowCodec::new(self.options.parse_policy))
            .with_batch_size(self.options.batch_size);
        debug!(columns = ?request.columns, "ingest plan built");

        transitions.enter(PipelineState::Streaming);
        let statement = InsertStatement::new(&request.output, &request.columns);
        let mut inserter =
            BatchInserter::new(connection, context, statement, self.options.insert_mode);
        while let Some(batch) = reader.next_batch()? {
            inserter.submit(batch)?;
        }
        debug!(
            rows = inserter.submitted(),
            batches = inserter.batches(),
            "ingest stream exhausted"
        );
        Ok(inserter.submitted())
    }

    /// Return up to `preview_limit` sample rows as text, never more than
    /// [`PREVIEW_ROW_LIMIT`].
    ///
    /// Database previews use the same classification and codec as exports.
    /// Flat-file previews need no connection.
    pub fn preview(&self, request: &PreviewRequest) -> Result<PreviewResult> {
        if request.columns.is_empty() {
            return Err(BridgeError::InvalidRequest(
                "at least one column must be requested".to_string(),
            ));
        }
        let limit = self.options.preview_limit.min(PREVIEW_ROW_LIMIT);
        let rows = match request.source {
            Endpoint::ClickHouse => self.preview_table(request, limit)?,
            Endpoint::FlatFile => self.preview_file(request, limit)?,
        };
        debug!(
            source = %request.source,
            table = %request.table,
            rows = rows.len(),
            "preview loaded"
        );
        Ok(PreviewResult {
            headers: request.columns.clone(),
            rows,
        })
    }

    fn preview_table(&self, request: &PreviewRequest, limit: usize) -> Result<Vec<Vec<String>>> {
        let connection = self.handle.get()?;
        let context = &self.options.context;
        let plan = TypeResolver::new(connection, context)
            .describe(&request.table)?
            .plan(&request.columns)?;
        let sql = select_statement(&request.table, &plan, Some(limit));
        let mut cursor = connection
            .query(context, &sql, &[])
            .map_err(BridgeError::Query)?;

        let codec = RowCodec::default();
        let mut rows = Vec::with_capacity(limit);
        copy_rows(cursor.as_mut(), &plan, |values| {
            if rows.len() < limit {
                rows.push(values.iter().map(|value| codec.encode(value)).collect());
            }
            Ok(())
        })?;
        Ok(rows)
    }

    fn preview_file(&self, request: &PreviewRequest, limit: usize) -> Result<Vec<Vec<String>>> {
        let columns: Vec<ColumnSpec> = request
            .columns
            .iter()
            .map(|name| ColumnSpec::untyped(name.as_str()))
            .collect();
        let mut reader = self.open_flat_file(&request.table)?.select(&columns)?;
        let codec = RowCodec::default();
        let mut rows = Vec::with_capacity(limit);
        while rows.len() < limit {
            let Some(values) = reader.next_row()? else {
                break;
            };
            rows.push(values.iter().map(|value| codec.encode(value)).collect());
        }
        Ok(rows)
    }

    /// Names of the tables in the connected database.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let connection = self.handle.get()?;
        let mut cursor = connection
            .query(&self.options.context, SHOW_TABLES, &[])
            .map_err(BridgeError::Query)?;
        let mut tables = Vec::new();
        while let Some(row) = cursor.next_row().map_err(BridgeError::Query)? {
            match row.into_iter().next() {
                Some(RawValue::Text(name)) => tables.push(name),
                Some(other) => tables.push(other.to_string()),
                None => {
                    return Err(BridgeError::Query(ConnectionError::Protocol(
                        "table listing returned an empty row".to_string(),
                    )));
                }
            }
        }
        debug!(count = tables.len(), "listed tables");
        Ok(tables)
    }

    /// Catalog columns of `table`, with raw and transfer types.
    pub fn describe_table(&self, table: &str) -> Result<Vec<CatalogColumn>> {
        let connection = self.handle.get()?;
        let schema = TypeResolver::new(connection, &self.options.context).describe(table)?;
        Ok(schema.columns)
    }

    /// Header columns of a flat file. Flat files carry no types, so every
    /// column is a string.
    pub fn flat_file_columns(&self, path: &str) -> Result<Vec<ColumnSpec>> {
        let reader = self.open_flat_file(path)?;
        Ok(reader
            .headers()
            .iter()
            .map(|name| ColumnSpec::untyped(name.as_str()))
            .collect())
    }

    fn open_flat_file(&self, path: &str) -> Result<CsvBatchReader<Box<dyn std::io::Read>>> {
        let source = self
            .storage
            .open(path)
            .map_err(|err| BridgeError::io("open", self.storage.resolve(path), err))?;
        CsvBatchReader::open(source, path, self.options.csv)
    }
}

/// Check the request's domain constraints and work out its direction.
fn validate(request: &IngestionRequest) -> Result<Direction> {
    let direction = request
        .direction()
        .ok_or(BridgeError::InvalidCombination {
            from: request.source,
            to: request.target,
        })?;
    if request.table.trim().is_empty() {
        return Err(BridgeError::InvalidRequest("table must not be empty".to_string()));
    }
    if request.output.trim().is_empty() {
        return Err(BridgeError::InvalidRequest("output must not be empty".to_string()));
    }
    if request.columns.is_empty() {
        return Err(BridgeError::InvalidRequest(
            "at least one column must be requested".to_string(),
        ));
    }
    Ok(direction)
}

/// Scan every cursor row into the plan's types and hand it to `sink`.
fn copy_rows(
    cursor: &mut (dyn RowCursor + '_),
    plan: &[ColumnSpec],
    mut sink: impl FnMut(Vec<TransferValue>) -> Result<()>,
) -> Result<u64> {
    let codec = RowCodec::default();
    let mut row = 0;
    while let Some(raw) = cursor.next_row().map_err(BridgeError::Query)? {
        row += 1;
        if raw.len() != plan.len() {
            return Err(BridgeError::Query(ConnectionError::Protocol(format!(
                "row {row} has {} fields, expected {}",
                raw.len(),
                plan.len()
            ))));
        }
        let values = raw
            .into_iter()
            .zip(plan)
            .map(|(value, column)| codec.scan(value, column, row))
            .collect::<Result<Vec<_>>>()?;
        sink(values)?;
    }
    Ok(row)
}

/// Run a transfer over the local filesystem with default options.
pub fn run_ingestion(handle: &ConnectionHandle, request: &IngestionRequest) -> Result<IngestionResult> {
    IngestionPipeline::local(handle.clone()).run(request)
}

/// Preview a table or flat file over the local filesystem with default options.
pub fn preview(handle: &ConnectionHandle, request: &PreviewRequest) -> Result<PreviewResult> {
    IngestionPipeline::local(handle.clone()).preview(request)
}
