use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chbridge_cli::config::{BridgeConfig, load_config};
use chbridge_cli::render::{
    catalog_table, file_columns_table, preview_table, tables_table, to_json, transfer_summary,
};
use chbridge_clickhouse::ClickHouseClient;
use chbridge_model::{Endpoint, IngestionRequest, PreviewRequest};
use chbridge_pipeline::{ConnectionHandle, IngestionPipeline, LocalStorage, ParsePolicy, TransferOptions};
use serde::Serialize;
use serde_json::json;

use crate::cli::{Cli, ColumnsArgs, Command, IngestArgs, PreviewArgs};

/// Settings resolved from the config file and flags for one invocation.
struct Session {
    config: BridgeConfig,
    options: TransferOptions,
    json: bool,
}

pub fn run(cli: &Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    apply_overrides(&mut config, cli);
    let session = Session::new(config, cli.json)?;
    match &cli.command {
        Command::Ping => session.ping(),
        Command::Tables => session.tables(),
        Command::Columns(args) => session.columns(args),
        Command::Preview(args) => session.preview(args),
        Command::Ingest(args) => session.ingest(args),
    }
}

/// Flags win over the config file.
fn apply_overrides(config: &mut BridgeConfig, cli: &Cli) {
    let connection = &cli.connection;
    let clickhouse = &mut config.clickhouse;
    if let Some(host) = &connection.host {
        clickhouse.host.clone_from(host);
    }
    if let Some(port) = connection.port {
        clickhouse.port = port;
    }
    if let Some(database) = &connection.database {
        clickhouse.database.clone_from(database);
    }
    if let Some(user) = &connection.user {
        clickhouse.user.clone_from(user);
    }
    if let Some(password) = &connection.password {
        clickhouse.password.clone_from(password);
    }
    if connection.secure {
        clickhouse.secure = true;
    }

    let args = &cli.transfer;
    let transfer = &mut config.transfer;
    if let Some(batch_size) = args.batch_size {
        transfer.batch_size = batch_size;
    }
    if args.strict {
        transfer.parse_policy = ParsePolicy::Strict;
    }
    if let Some(mode) = args.insert_mode {
        transfer.insert_mode = mode.into();
    }
    if let Some(delimiter) = args.delimiter {
        transfer.delimiter = delimiter;
    }
    if let Some(dir) = &args.uploads_dir {
        transfer.uploads_dir = Some(dir.clone());
    }
}

impl Session {
    fn new(config: BridgeConfig, json: bool) -> Result<Self> {
        let options = config.transfer.options(config.clickhouse.timeout())?;
        Ok(Self {
            config,
            options,
            json,
        })
    }

    fn connect(&self) -> Result<ConnectionHandle> {
        let client = ClickHouseClient::connect(self.config.clickhouse.clone())?;
        Ok(ConnectionHandle::connected(client))
    }

    /// Connect only when the endpoint is the database.
    fn handle_for(&self, endpoint: Endpoint) -> Result<ConnectionHandle> {
        match endpoint {
            Endpoint::ClickHouse => self.connect(),
            Endpoint::FlatFile => Ok(ConnectionHandle::unset()),
        }
    }

    fn pipeline(&self, handle: ConnectionHandle) -> IngestionPipeline<LocalStorage> {
        IngestionPipeline::new(handle, self.config.transfer.storage())
            .with_options(self.options.clone())
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", to_json(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        self.connect()?;
        let address = self.config.clickhouse.base_url();
        let database = &self.config.clickhouse.database;
        self.emit(&json!({ "address": address, "database": database }), || {
            format!("ClickHouse at {address} is reachable (database {database})")
        })
    }

    fn tables(&self) -> Result<()> {
        let tables = self.pipeline(self.connect()?).list_tables()?;
        self.emit(&tables, || tables_table(&tables).to_string())
    }

    fn columns(&self, args: &ColumnsArgs) -> Result<()> {
        if let Some(path) = &args.file {
            let pipeline = self.pipeline(ConnectionHandle::unset());
            let columns = pipeline.flat_file_columns(path)?;
            return self.emit(&columns, || file_columns_table(&columns).to_string());
        }
        let table = args
            .table
            .as_deref()
            .context("a table name or --file is required")?;
        let columns = self.pipeline(self.connect()?).describe_table(table)?;
        self.emit(&columns, || catalog_table(&columns).to_string())
    }

    fn preview(&self, args: &PreviewArgs) -> Result<()> {
        let request = PreviewRequest {
            source: args.source.into(),
            table: args.table.clone(),
            columns: args.columns.clone(),
        };
        let pipeline = self.pipeline(self.handle_for(request.source)?);
        let preview = pipeline.preview(&request)?;
        self.emit(&preview, || preview_table(&preview).to_string())
    }

    fn ingest(&self, args: &IngestArgs) -> Result<()> {
        let request = match &args.request {
            Some(path) => read_request(path)?,
            None => inline_request(args)?,
        };
        // An invalid endpoint pair is reported by the pipeline without a connection.
        let handle = if request.direction().is_some() {
            self.connect()?
        } else {
            ConnectionHandle::unset()
        };
        let result = self.pipeline(handle).run(&request)?;
        self.emit(&result, || transfer_summary(&request, &result))
    }
}

fn read_request(path: &Path) -> Result<IngestionRequest> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read request {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid request {}", path.display()))
}

fn inline_request(args: &IngestArgs) -> Result<IngestionRequest> {
    Ok(IngestionRequest {
        source: args.source.context("--source is required")?.into(),
        target: args.target.context("--target is required")?.into(),
        table: args.table.clone().context("--table is required")?,
        columns: args.columns.clone(),
        output: args.output.clone().context("--output is required")?,
    })
}
