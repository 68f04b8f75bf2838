//! Typed, batched transfer between ClickHouse tables and delimited files.
//!
//! The [`IngestionPipeline`] resolves catalog types once per request, maps the
//! requested columns to a fixed plan and streams rows one batch at a time.
//! Database access goes through the [`Connection`] seam and file access
//! through [`FileStorage`].

pub mod batch;
pub mod codec;
pub mod connection;
pub mod error;
pub mod mapper;
pub mod memory;
pub mod options;
pub mod pipeline;
pub mod resolver;
pub mod sql;
pub mod storage;

pub use batch::{Batch, BatchInserter, CsvBatchReader, CsvBatchWriter, DEFAULT_BATCH_SIZE, InsertMode};
pub use codec::{ParsePolicy, RowCodec};
pub use connection::{Connection, ConnectionHandle, QueryContext, RowCursor};
pub use error::{BridgeError, ConnectionError, ErrorKind, Result};
pub use mapper::map_columns;
pub use options::{CsvFormat, PREVIEW_ROW_LIMIT, TransferOptions};
pub use pipeline::{IngestionPipeline, PipelineState, preview, run_ingestion};
pub use resolver::{TableSchema, TypeResolver, classify};
pub use storage::{FileStorage, LocalStorage};
