use std::cell::Cell;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chbridge_model::{ColumnSpec, Endpoint, IngestionRequest, PreviewRequest, RawValue, TransferType};
use chbridge_pipeline::memory::MemoryConnection;
use chbridge_pipeline::sql::select_statement;
use chbridge_pipeline::{
    BridgeError, ConnectionHandle, FileStorage, IngestionPipeline, LocalStorage, PipelineState,
    TransferOptions, preview, run_ingestion,
};

/// Storage that counts accesses and never touches the filesystem.
#[derive(Default)]
struct CountingStorage {
    accesses: Cell<usize>,
}

impl FileStorage for CountingStorage {
    fn resolve(&self, path: &str) -> PathBuf {
        PathBuf::from(path)
    }

    fn open(&self, _path: &str) -> io::Result<Box<dyn Read>> {
        self.accesses.set(self.accesses.get() + 1);
        Err(io::Error::new(io::ErrorKind::NotFound, "counting storage"))
    }

    fn create(&self, _path: &str) -> io::Result<Box<dyn Write>> {
        self.accesses.set(self.accesses.get() + 1);
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "counting storage"))
    }
}

fn request(source: Endpoint, target: Endpoint) -> IngestionRequest {
    IngestionRequest {
        source,
        target,
        table: "people.csv".to_string(),
        columns: vec!["id".to_string()],
        output: "copy.csv".to_string(),
    }
}

fn observe(
    pipeline: &IngestionPipeline<CountingStorage>,
    request: &IngestionRequest,
) -> (Result<u64, BridgeError>, Vec<PipelineState>) {
    let mut states = Vec::new();
    let result = pipeline
        .run_observed(request, &mut |state| states.push(state))
        .map(|result| result.record_count);
    (result, states)
}

#[test]
fn flat_file_to_flat_file_is_rejected_before_storage() {
    let pipeline = IngestionPipeline::new(ConnectionHandle::unset(), CountingStorage::default());

    let (result, states) = observe(&pipeline, &request(Endpoint::FlatFile, Endpoint::FlatFile));

    let err = result.unwrap_err();
    assert!(
        matches!(
            err,
            BridgeError::InvalidCombination {
                from: Endpoint::FlatFile,
                to: Endpoint::FlatFile
            }
        ),
        "{err}"
    );
    assert_eq!(states, vec![PipelineState::Validating, PipelineState::Failed]);
    assert_eq!(pipeline.storage().accesses.get(), 0);
}

#[test]
fn database_to_database_is_rejected() {
    let memory = MemoryConnection::new();
    let pipeline = IngestionPipeline::new(ConnectionHandle::connected(memory), CountingStorage::default());

    let (result, _) = observe(&pipeline, &request(Endpoint::ClickHouse, Endpoint::ClickHouse));

    assert_eq!(result.unwrap_err().payload().kind, "invalid_combination");
    assert_eq!(pipeline.storage().accesses.get(), 0);
}

#[test]
fn unset_handle_fails_every_database_operation() {
    let pipeline = IngestionPipeline::new(ConnectionHandle::unset(), CountingStorage::default());

    let (result, states) = observe(&pipeline, &request(Endpoint::ClickHouse, Endpoint::FlatFile));
    assert!(matches!(result, Err(BridgeError::NotInitialized)));
    assert_eq!(states.last(), Some(&PipelineState::Failed));

    assert!(matches!(pipeline.list_tables(), Err(BridgeError::NotInitialized)));
    assert!(matches!(pipeline.describe_table("people"), Err(BridgeError::NotInitialized)));
    let preview_request = PreviewRequest {
        source: Endpoint::ClickHouse,
        table: "people".to_string(),
        columns: vec!["id".to_string()],
    };
    assert!(matches!(pipeline.preview(&preview_request), Err(BridgeError::NotInitialized)));
    assert_eq!(pipeline.storage().accesses.get(), 0);

    let err = run_ingestion(&ConnectionHandle::unset(), &request(Endpoint::FlatFile, Endpoint::ClickHouse))
        .unwrap_err();
    assert_eq!(err.to_string(), "connection not initialized");
}

#[test]
fn empty_column_list_is_an_invalid_request() {
    let pipeline = IngestionPipeline::new(ConnectionHandle::unset(), CountingStorage::default());
    let mut empty = request(Endpoint::ClickHouse, Endpoint::FlatFile);
    empty.columns.clear();

    let (result, states) = observe(&pipeline, &empty);

    assert!(matches!(result, Err(BridgeError::InvalidRequest(_))));
    assert_eq!(states, vec![PipelineState::Validating, PipelineState::Failed]);
}

#[test]
fn successful_run_walks_every_state() {
    let plan = vec![ColumnSpec::new("id", TransferType::UInt32)];
    let memory = MemoryConnection::new()
        .with_table("people", &[("id", "UInt32")])
        .with_query(select_statement("people", &plan, None), vec![vec![RawValue::UInt(1)]]);
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("people.csv");
    let export = IngestionRequest {
        source: Endpoint::ClickHouse,
        target: Endpoint::FlatFile,
        table: "people".to_string(),
        columns: vec!["id".to_string()],
        output: output.to_string_lossy().into_owned(),
    };

    let mut states = Vec::new();
    let result = IngestionPipeline::local(ConnectionHandle::connected(memory))
        .run_observed(&export, &mut |state| states.push(state))
        .expect("export");

    assert_eq!(result.record_count, 1);
    assert_eq!(
        states,
        vec![
            PipelineState::Validating,
            PipelineState::Resolving,
            PipelineState::Mapping,
            PipelineState::Streaming,
            PipelineState::Completed,
        ]
    );
    assert!(states.last().is_some_and(|state| state.is_terminal()));
}

#[test]
fn flat_file_preview_needs_no_connection_and_stops_at_five_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("people.csv");
    let mut contents = String::from("id,name,age\n");
    for idx in 1..=8 {
        contents.push_str(&format!("{idx},person {idx},{}\n", 20 + idx));
    }
    fs::write(&path, contents).expect("write csv");

    let result = preview(
        &ConnectionHandle::unset(),
        &PreviewRequest {
            source: Endpoint::FlatFile,
            table: path.to_string_lossy().into_owned(),
            columns: vec!["age".to_string(), "id".to_string()],
        },
    )
    .expect("preview");

    assert_eq!(result.headers, vec!["age", "id"]);
    assert_eq!(result.rows.len(), 5);
    assert_eq!(result.rows[0], vec!["21", "1"]);
    assert_eq!(result.rows[4], vec!["25", "5"]);
}

#[test]
fn preview_limit_only_lowers_the_sample_size() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("people.csv");
    let mut contents = String::from("id\n");
    for idx in 1..=12 {
        contents.push_str(&format!("{idx}\n"));
    }
    fs::write(&path, contents).expect("write csv");
    let request = PreviewRequest {
        source: Endpoint::FlatFile,
        table: path.to_string_lossy().into_owned(),
        columns: vec!["id".to_string()],
    };
    let pipeline_with_limit = |limit: usize| {
        let mut options = TransferOptions::new();
        options.preview_limit = limit;
        IngestionPipeline::local(ConnectionHandle::unset()).with_options(options)
    };

    let raised = pipeline_with_limit(50).preview(&request).expect("preview");
    let lowered = pipeline_with_limit(2).preview(&request).expect("preview");

    assert_eq!(raised.rows.len(), 5);
    assert_eq!(lowered.rows, vec![vec!["1"], vec!["2"]]);
}

#[test]
fn table_preview_uses_limit_and_export_formatting() {
    let plan = vec![
        ColumnSpec::new("name", TransferType::String),
        ColumnSpec::new("fare", TransferType::Float32),
    ];
    let memory = Arc::new(
        MemoryConnection::new()
            .with_table("trips", &[("fare", "Float32"), ("name", "LowCardinality(String)")])
            .with_query(
                select_statement("trips", &plan, Some(5)),
                vec![
                    vec!["ann".into(), RawValue::Float(2.5)],
                    vec![RawValue::Null, RawValue::Float(10.0)],
                ],
            ),
    );

    let result = preview(
        &ConnectionHandle::from_shared(memory.clone()),
        &PreviewRequest {
            source: Endpoint::ClickHouse,
            table: "trips".to_string(),
            columns: vec!["name".to_string(), "fare".to_string()],
        },
    )
    .expect("preview");

    assert_eq!(result.headers, vec!["name", "fare"]);
    assert_eq!(result.rows, vec![vec!["ann", "2.50"], vec!["", "10.00"]]);
    assert!(memory.queried()[1].ends_with("LIMIT 5"));
}

#[test]
fn preview_rejects_unknown_file_column() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("people.csv");
    fs::write(&path, "id,name\n1,a\n").expect("write csv");

    let err = IngestionPipeline::local(ConnectionHandle::unset())
        .preview(&PreviewRequest {
            source: Endpoint::FlatFile,
            table: path.to_string_lossy().into_owned(),
            columns: vec!["email".to_string()],
        })
        .unwrap_err();

    assert_eq!(err.column(), Some("email"));
}

#[test]
fn catalog_browsing() {
    let memory = MemoryConnection::new()
        .with_tables(&["people", "trips"])
        .with_table(
            "trips",
            &[("id", "UInt32"), ("kind", "Enum8('cab' = 1)"), ("at", "DateTime")],
        );
    let pipeline = IngestionPipeline::local(ConnectionHandle::connected(memory));

    assert_eq!(pipeline.list_tables().expect("tables"), vec!["people", "trips"]);

    let columns = pipeline.describe_table("trips").expect("describe");
    let summary: Vec<(&str, &str, TransferType)> = columns
        .iter()
        .map(|column| (column.name.as_str(), column.raw_type.as_str(), column.transfer_type))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("id", "UInt32", TransferType::UInt32),
            ("kind", "Enum8('cab' = 1)", TransferType::String),
            ("at", "DateTime", TransferType::DateTime),
        ]
    );
}

#[test]
fn flat_file_columns_are_untyped() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("upload.csv"), "id;fare;pickup\n1;2.5;x\n").expect("write csv");

    let pipeline = IngestionPipeline::new(ConnectionHandle::unset(), LocalStorage::rooted(dir.path()))
        .with_options(
            chbridge_pipeline::TransferOptions::new()
                .with_csv_format(chbridge_pipeline::CsvFormat::with_delimiter(b';')),
        );
    let columns = pipeline.flat_file_columns("upload.csv").expect("columns");

    assert_eq!(
        columns,
        vec![
            ColumnSpec::untyped("id"),
            ColumnSpec::untyped("fare"),
            ColumnSpec::untyped("pickup"),
        ]
    );
}
