//! SQL text generation for catalog, export and insert statements.

use chbridge_model::{ColumnSpec, TransferType};

/// Statement listing the tables of the current database.
pub const SHOW_TABLES: &str = "SHOW TABLES";

/// Output layout for formatted timestamps, `YYYY-MM-DD HH:MM:SS`.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%i:%S";

/// Quote a single identifier with backticks.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('`');
    for ch in name.chars() {
        if ch == '`' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('`');
    quoted
}

/// Quote a possibly database-qualified table name (`db.table`).
#[must_use]
pub fn quote_table(name: &str) -> String {
    name.split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

/// Catalog query returning one `(name, type, ...)` row per column.
#[must_use]
pub fn describe_statement(table: &str) -> String {
    format!("DESCRIBE TABLE {}", quote_table(table))
}

/// Projection for one exported column.
///
/// Timestamps are formatted by the server so rows arrive as text.
#[must_use]
pub fn projection(column: &ColumnSpec) -> String {
    let name = quote_identifier(&column.name);
    match column.transfer_type {
        TransferType::DateTime => {
            format!("formatDateTime({name}, '{DATETIME_FORMAT}') AS {name}")
        }
        _ => name,
    }
}

/// `SELECT` over the planned columns, in plan order.
#[must_use]
pub fn select_statement(table: &str, columns: &[ColumnSpec], limit: Option<usize>) -> String {
    let projections: Vec<String> = columns.iter().map(projection).collect();
    let mut sql = format!(
        "SELECT {} FROM {}",
        projections.join(", "),
        quote_table(table)
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    sql
}

/// Positional-placeholder `INSERT` built once per transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    table: String,
    head: String,
    row_template: String,
    column_count: usize,
}

impl InsertStatement {
    pub fn new<S: AsRef<str>>(table: &str, columns: &[S]) -> Self {
        let names: Vec<String> = columns
            .iter()
            .map(|column| quote_identifier(column.as_ref()))
            .collect();
        let head = format!(
            "INSERT INTO {} ({}) VALUES ",
            quote_table(table),
            names.join(", ")
        );
        let row_template = format!("({})", vec!["?"; columns.len()].join(", "));
        Self {
            table: table.to_string(),
            head,
            row_template,
            column_count: columns.len(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Statement inserting a single row.
    #[must_use]
    pub fn single_row(&self) -> String {
        self.rows(1)
    }

    /// Statement inserting `count` rows in one submission.
    #[must_use]
    pub fn rows(&self, count: usize) -> String {
        let mut sql = String::with_capacity(self.head.len() + count * (self.row_template.len() + 2));
        sql.push_str(&self.head);
        for idx in 0..count {
            if idx > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&self.row_template);
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_qualified_tables() {
        assert_eq!(quote_table("uk.uk_price_paid"), "`uk`.`uk_price_paid`");
        assert_eq!(quote_identifier("we`ird"), "`we\\`ird`");
    }

    #[test]
    fn select_formats_datetime_columns() {
        let columns = vec![
            ColumnSpec::new("id", TransferType::UInt32),
            ColumnSpec::new("pickup", TransferType::DateTime),
        ];
        assert_eq!(
            select_statement("trips", &columns, Some(5)),
            "SELECT `id`, formatDateTime(`pickup`, '%Y-%m-%d %H:%i:%S') AS `pickup` \
             FROM `trips` LIMIT 5"
        );
    }

    #[test]
    fn insert_template_matches_column_count() {
        let statement = InsertStatement::new("people", &["id", "age"]);
        assert_eq!(
            statement.single_row(),
            "INSERT INTO `people` (`id`, `age`) VALUES (?, ?)"
        );
        assert_eq!(
            statement.rows(2),
            "INSERT INTO `people` (`id`, `age`) VALUES (?, ?), (?, ?)"
        );
        assert_eq!(statement.column_count(), 2);
    }
}
