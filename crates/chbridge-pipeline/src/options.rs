//! Transfer configuration.

use std::time::Duration;

use crate::batch::{DEFAULT_BATCH_SIZE, InsertMode};
use crate::codec::ParsePolicy;
use crate::connection::QueryContext;

/// Number of sample rows returned by a preview.
pub const PREVIEW_ROW_LIMIT: usize = 5;

/// Flat-file dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvFormat {
    pub delimiter: u8,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvFormat {
    #[must_use]
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    pub(crate) fn reader_builder(self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder.delimiter(self.delimiter).has_headers(true);
        builder
    }

    pub(crate) fn writer_builder(self) -> csv::WriterBuilder {
        let mut builder = csv::WriterBuilder::new();
        builder.delimiter(self.delimiter);
        builder
    }
}

/// Options applied to every run of an [`IngestionPipeline`](crate::IngestionPipeline).
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Rows per batch; values below 1 are treated as 1.
    pub batch_size: usize,
    pub parse_policy: ParsePolicy,
    pub insert_mode: InsertMode,
    pub csv: CsvFormat,
    /// Rows returned by a preview; capped at [`PREVIEW_ROW_LIMIT`].
    pub preview_limit: usize,
    pub context: QueryContext,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            parse_policy: ParsePolicy::default(),
            insert_mode: InsertMode::default(),
            csv: CsvFormat::default(),
            preview_limit: PREVIEW_ROW_LIMIT,
            context: QueryContext::default(),
        }
    }
}

impl TransferOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_parse_policy(mut self, policy: ParsePolicy) -> Self {
        self.parse_policy = policy;
        self
    }

    #[must_use]
    pub fn with_insert_mode(mut self, mode: InsertMode) -> Self {
        self.insert_mode = mode;
        self
    }

    #[must_use]
    pub fn with_csv_format(mut self, csv: CsvFormat) -> Self {
        self.csv = csv;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.context = self.context.with_timeout(timeout);
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: QueryContext) -> Self {
        self.context = context;
        self
    }
}
