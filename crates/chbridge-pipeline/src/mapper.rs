//! Requested-column to available-column position mapping.

use std::collections::HashMap;

use crate::error::{BridgeError, Result};

/// Map each requested column to its position in `available`.
///
/// The first occurrence of a duplicated name wins. Fails on the first
/// requested column that is not available, and no mapping is returned.
/// `origin` names the header list in the error (a file or a table).
pub fn map_columns<R, A>(requested: &[R], available: &[A], origin: &str) -> Result<Vec<usize>>
where
    R: AsRef<str>,
    A: AsRef<str>,
{
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(available.len());
    for (idx, name) in available.iter().enumerate() {
        positions.entry(name.as_ref()).or_insert(idx);
    }
    requested
        .iter()
        .map(|column| {
            let column = column.as_ref();
            positions
                .get(column)
                .copied()
                .ok_or_else(|| BridgeError::unknown_column(column, origin, available))
        })
        .collect()
}
