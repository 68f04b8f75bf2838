//! Batched streaming between CSV files and the database.
//!
//! [`CsvBatchWriter`] turns cursor rows into CSV records for export,
//! [`CsvBatchReader`] turns CSV records into typed batches for ingest and
//! [`BatchInserter`] submits those batches to the destination table. Only
//! one batch is ever held in memory.

use std::io::{Read, Write};
use std::path::PathBuf;

use chbridge_model::{ColumnSpec, TransferValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::RowCodec;
use crate::connection::{Connection, QueryContext};
use crate::error::{BridgeError, Result};
use crate::mapper::map_columns;
use crate::options::CsvFormat;
use crate::sql::InsertStatement;

/// Maximum rows per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Rows read together, each aligned with the transfer plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    first_row: u64,
    rows: Vec<Vec<TransferValue>>,
}

impl Batch {
    /// An empty batch whose first row will be data row `first_row` (1-based).
    #[must_use]
    pub fn new(first_row: u64, capacity: usize) -> Self {
        Self {
            first_row,
            rows: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, row: Vec<TransferValue>) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn first_row(&self) -> u64 {
        self.first_row
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<TransferValue>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Vec<TransferValue>> {
        self.rows
    }
}

/// Writes typed rows as CSV records, flushing the sink once per batch.
///
/// Rows already written stay in the sink when a later row fails.
pub struct CsvBatchWriter<W: Write> {
    writer: csv::Writer<W>,
    codec: RowCodec,
    destination: PathBuf,
    batch_size: usize,
    pending: usize,
    written: u64,
    flushed_batches: u64,
}

impl<W: Write> CsvBatchWriter<W> {
    /// Create the writer and emit the header record.
    pub fn new<S: AsRef<str>>(
        sink: W,
        destination: impl Into<PathBuf>,
        headers: &[S],
        format: CsvFormat,
    ) -> Result<Self> {
        let destination = destination.into();
        let mut writer = format.writer_builder().from_writer(sink);
        writer
            .write_record(headers.iter().map(|header| header.as_ref()))
            .map_err(|err| BridgeError::io("write header to", destination.clone(), err.into()))?;
        Ok(Self {
            writer,
            codec: RowCodec::default(),
            destination,
            batch_size: DEFAULT_BATCH_SIZE,
            pending: 0,
            written: 0,
            flushed_batches: 0,
        })
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Encode and write one row.
    pub fn write_row(&mut self, row: &[TransferValue]) -> Result<()> {
        let row_number = self.written + 1;
        let fields: Vec<String> = row.iter().map(|value| self.codec.encode(value)).collect();
        self.writer
            .write_record(&fields)
            .map_err(|source| BridgeError::Csv {
                row: row_number,
                source,
            })?;
        self.written = row_number;
        self.pending += 1;
        if self.pending >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Push buffered records to the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|err| BridgeError::io("write", self.destination.clone(), err))?;
        if self.pending > 0 {
            self.flushed_batches += 1;
            debug!(
                batch = self.flushed_batches,
                rows = self.pending,
                destination = %self.destination.display(),
                "flushed batch"
            );
            self.pending = 0;
        }
        Ok(())
    }

    /// Data rows written so far, header excluded.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush the remaining rows and return the number of data rows written.
    pub fn finish(mut self) -> Result<u64> {
        self.flush()?;
        Ok(self.written)
    }
}

/// Reads CSV records into typed batches aligned with a column selection.
pub struct CsvBatchReader<R: Read> {
    reader: csv::Reader<R>,
    origin: String,
    headers: Vec<String>,
    plan: Vec<(usize, ColumnSpec)>,
    codec: RowCodec,
    batch_size: usize,
    record: csv::StringRecord,
    rows_read: u64,
}

impl<R: Read> CsvBatchReader<R> {
    /// Read the header record of `source`. `origin` names the file in errors.
    ///
    /// Until [`select`](Self::select) is called every column is read as text,
    /// in file order.
    pub fn open(source: R, origin: impl Into<String>, format: CsvFormat) -> Result<Self> {
        let origin = origin.into();
        let mut reader = format.reader_builder().from_reader(source);
        let headers: Vec<String> = reader
            .headers()
            .map_err(|err| BridgeError::io("read header of", origin.as_str(), err.into()))?
            .iter()
            .map(normalize_header)
            .collect();
        let plan = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (idx, ColumnSpec::untyped(name.as_str())))
            .collect();
        Ok(Self {
            reader,
            origin,
            headers,
            plan,
            codec: RowCodec::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            record: csv::StringRecord::new(),
            rows_read: 0,
        })
    }

    /// Header names, in file order.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Restrict and reorder the columns read to `columns`.
    pub fn select(mut self, columns: &[ColumnSpec]) -> Result<Self> {
        let names: Vec<&str> = columns.iter().map(|column| column.name.as_str()).collect();
        let positions = map_columns(&names, &self.headers, &self.origin)?;
        self.plan = positions.into_iter().zip(columns.iter().cloned()).collect();
        Ok(self)
    }

    #[must_use]
    pub fn with_codec(mut self, codec: RowCodec) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Columns produced by this reader, in output order.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.plan.iter().map(|(_, column)| column)
    }

    /// Data rows read so far.
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Read and decode the next data row.
    pub fn next_row(&mut self) -> Result<Option<Vec<TransferValue>>> {
        let row = self.rows_read + 1;
        let more = self
            .reader
            .read_record(&mut self.record)
            .map_err(|source| BridgeError::Csv { row, source })?;
        if !more {
            return Ok(None);
        }
        self.rows_read = row;
        self.plan
            .iter()
            .map(|(position, column)| {
                let field = self.record.get(*position).unwrap_or_default();
                self.codec.decode_field(field, column, row)
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Read up to `batch_size` rows. Returns `None` at end of input.
    pub fn next_batch(&mut self) -> Result<Option<Batch>> {
        let mut batch = Batch::new(self.rows_read + 1, self.batch_size);
        while batch.len() < self.batch_size {
            match self.next_row()? {
                Some(row) => batch.push(row),
                None => break,
            }
        }
        Ok((!batch.is_empty()).then_some(batch))
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

/// How batches are submitted to the destination table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// One statement per row. A failure leaves earlier rows of the batch
    /// inserted.
    #[default]
    RowByRow,
    /// One multi-row statement per batch.
    Batched,
}

/// Submits batches through a prepared insert statement.
pub struct BatchInserter<'a> {
    connection: &'a dyn Connection,
    context: &'a QueryContext,
    statement: InsertStatement,
    mode: InsertMode,
    single_row_sql: String,
    submitted: u64,
    batches: u64,
}

impl<'a> BatchInserter<'a> {
    pub fn new(
        connection: &'a dyn Connection,
        context: &'a QueryContext,
        statement: InsertStatement,
        mode: InsertMode,
    ) -> Self {
        let single_row_sql = statement.single_row();
        Self {
            connection,
            context,
            statement,
            mode,
            single_row_sql,
            submitted: 0,
            batches: 0,
        }
    }

    /// Submit one batch and return the number of rows it carried.
    pub fn submit(&mut self, batch: Batch) -> Result<u64> {
        let first_row = batch.first_row();
        let count = batch.len() as u64;
        match self.mode {
            InsertMode::RowByRow => {
                for (row, values) in (first_row..).zip(batch.into_rows()) {
                    self.exec(&self.single_row_sql, &values, row)?;
                }
            }
            InsertMode::Batched => {
                let sql = self.statement.rows(batch.len());
                let values: Vec<TransferValue> = batch.into_rows().into_iter().flatten().collect();
                self.exec(&sql, &values, first_row)?;
            }
        }
        self.submitted += count;
        self.batches += 1;
        debug!(
            batch = self.batches,
            rows = count,
            first_row,
            table = self.statement.table(),
            "submitted batch"
        );
        Ok(count)
    }

    fn exec(&self, sql: &str, values: &[TransferValue], row: u64) -> Result<()> {
        self.connection
            .exec(self.context, sql, values)
            .map_err(|source| BridgeError::Exec {
                table: self.statement.table().to_string(),
                row,
                source,
            })
    }

    /// Rows submitted so far.
    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Batches submitted so far.
    #[must_use]
    pub fn batches(&self) -> u64 {
        self.batches
    }
}
