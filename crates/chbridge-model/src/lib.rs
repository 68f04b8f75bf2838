pub mod column;
pub mod error;
pub mod request;
pub mod result;
pub mod types;

pub use column::{CatalogColumn, ColumnSpec};
pub use error::{ModelError, Result};
pub use request::{Direction, Endpoint, IngestionRequest, PreviewRequest};
pub use result::{ErrorPayload, IngestionResult, PreviewResult};
pub use types::{RawValue, TransferType, TransferValue};
