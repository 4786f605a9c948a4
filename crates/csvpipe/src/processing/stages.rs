//! Individual table stages. Each takes a table by value and returns the result.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use super::config::ProcessingConfig;
use super::error::TransformError;
use super::table::Table;

/// Drops every column whose data cells are all empty or missing.
///
/// Cells are compared verbatim: whitespace counts as content.
///
/// When no column survives, the original header is kept with zero rows.
/// Rows are rebuilt to header width, so ragged rows come out aligned.
pub fn remove_empty_columns(table: Table) -> Table {
    let keep: Vec<usize> = (0..table.column_count())
        .filter(|&col| (0..table.row_count()).any(|row| !table.cell(row, col).is_empty()))
        .collect();

    if keep.is_empty() {
        debug!(columns = table.column_count(), "all columns empty, keeping header only");
        return Table::new(table.headers, Vec::new());
    }

    let headers = keep.iter().map(|&i| table.headers[i].clone()).collect();
    let rows = (0..table.row_count())
        .map(|row| keep.iter().map(|&col| table.cell(row, col).to_string()).collect())
        .collect();

    Table::new(headers, rows)
}

/// Keeps the first row for each composite key over `columns`.
///
/// Column names that are not in the header are ignored; when none resolve
/// the table passes through unchanged.
pub fn remove_duplicates(table: Table, columns: &[String]) -> Table {
    let indices: Vec<usize> = columns
        .iter()
        .filter_map(|name| table.column_index(name))
        .collect();

    if indices.is_empty() {
        debug!(?columns, "no duplicate-check column resolved, skipping");
        return table;
    }

    let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(table.row_count());
    let mut kept = Vec::with_capacity(table.row_count());

    for (row_index, row) in table.rows.iter().enumerate() {
        let key: Vec<String> = indices
            .iter()
            .map(|&col| table.cell(row_index, col).to_string())
            .collect();
        if seen.insert(key) {
            kept.push(row.clone());
        }
    }

    debug!(
        before = table.rows.len(),
        after = kept.len(),
        "duplicate rows removed"
    );
    Table::new(table.headers, kept)
}

/// Appends one column joining the non-empty values of `columns` with `delimiter`.
///
/// Source columns stay in place. The new header is the resolved names joined
/// with `_`. When none of the names resolve the table passes through unchanged.
pub fn merge_columns(table: Table, columns: &[String], delimiter: &str) -> Table {
    let resolved: Vec<(&str, usize)> = columns
        .iter()
        .filter_map(|name| table.column_index(name).map(|i| (name.as_str(), i)))
        .collect();

    if resolved.is_empty() {
        debug!(?columns, "no merge column resolved, skipping");
        return table;
    }

    let merged_name = resolved
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join("_");
    let width = table.column_count();

    let rows = (0..table.row_count())
        .map(|row| {
            let merged = resolved
                .iter()
                .map(|&(_, col)| table.cell(row, col))
                .filter(|value| !value.is_empty())
                .collect::<Vec<_>>()
                .join(delimiter);
            let mut out: Vec<String> = (0..width)
                .map(|col| table.cell(row, col).to_string())
                .collect();
            out.push(merged);
            out
        })
        .collect();

    let mut headers = table.headers;
    headers.push(merged_name);
    Table::new(headers, rows)
}

/// Renames mapped columns and drops everything else.
///
/// Output order follows the first header position of each mapped column.
/// Fails when no column maps to a real target.
pub fn apply_column_mappings(
    table: Table,
    mappings: &BTreeMap<String, String>,
) -> Result<Table, TransformError> {
    let mut seen = HashSet::new();
    let selected: Vec<(usize, String)> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, name)| seen.insert(name.as_str()))
        .filter_map(|(i, name)| match mappings.get(name) {
            Some(target) if !ProcessingConfig::is_excluded(target) => Some((i, target.clone())),
            _ => None,
        })
        .collect();

    if selected.is_empty() {
        return Err(TransformError::NoColumnsMapped);
    }

    let rows = (0..table.row_count())
        .map(|row| {
            selected
                .iter()
                .map(|(col, _)| table.cell(row, *col).to_string())
                .collect()
        })
        .collect();
    let headers = selected.into_iter().map(|(_, target)| target).collect();

    Ok(Table::new(headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_remove_empty_column() {
        let input = table(
            &["name", "notes", "email"],
            &[
                &["Jane", "", "j@x.com"],
                &["Bob", "", "b@x.com"],
                &["Ann", "", "a@x.com"],
                &["Tom", "", "t@x.com"],
            ],
        );
        let out = remove_empty_columns(input);
        assert_eq!(out.headers, strings(&["name", "email"]));
        assert_eq!(out.row_count(), 4);
        assert_eq!(out.rows[2], strings(&["Ann", "a@x.com"]));
    }

    #[test]
    fn test_whitespace_column_is_kept_verbatim() {
        let input = table(&["name", "pad"], &[&["Jane", " "], &["Bob", "  "]]);
        let out = remove_empty_columns(input.clone());
        assert_eq!(out, input);
    }

    #[test]
    fn test_remove_empty_columns_short_rows() {
        let input = table(&["a", "b", "c"], &[&["1"], &["2", "x"]]);
        let out = remove_empty_columns(input);
        assert_eq!(out.headers, strings(&["a", "b"]));
        assert_eq!(out.rows, vec![strings(&["1", ""]), strings(&["2", "x"])]);
    }

    #[test]
    fn test_remove_empty_columns_all_empty_keeps_header() {
        let input = table(&["a", "b"], &[&["", ""], &["", ""]]);
        let out = remove_empty_columns(input);
        assert_eq!(out.headers, strings(&["a", "b"]));
        assert_eq!(out.row_count(), 0);
    }

    #[test]
    fn test_remove_empty_columns_idempotent() {
        let cases = vec![
            table(&["a", "b", "c"], &[&["1", "", "3"], &["", "", ""]]),
            table(&["a", "b"], &[&["", ""]]),
            table(&["a"], &[]),
            table(&["x", "y", "z"], &[&["1"], &["", "2"], &["", "", ""]]),
        ];
        for input in cases {
            let once = remove_empty_columns(input);
            let twice = remove_empty_columns(once.clone());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_remove_duplicates_first_wins() {
        let input = table(
            &["email", "n"],
            &[&["a@x.com", "1"], &["a@x.com", "2"], &["b@x.com", "3"]],
        );
        let out = remove_duplicates(input, &strings(&["email"]));
        assert_eq!(
            out.rows,
            vec![strings(&["a@x.com", "1"]), strings(&["b@x.com", "3"])]
        );
    }

    #[test]
    fn test_remove_duplicates_composite_key() {
        let input = table(
            &["first", "last", "n"],
            &[
                &["Jane", "Doe", "1"],
                &["Jane", "Roe", "2"],
                &["Jane", "Doe", "3"],
            ],
        );
        let out = remove_duplicates(input, &strings(&["first", "last", "missing"]));
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.rows[1][2], "2");
    }

    #[test]
    fn test_remove_duplicates_no_key_column_resolves() {
        let input = table(&["a"], &[&["1"], &["1"]]);
        let out = remove_duplicates(input.clone(), &strings(&["missing"]));
        assert_eq!(out, input);
    }

    #[test]
    fn test_remove_duplicates_one_row_per_key() {
        let rows: Vec<Vec<String>> = (0..60)
            .map(|i| vec![format!("k{}", i % 7), i.to_string()])
            .collect();
        let input = Table::new(strings(&["key", "n"]), rows);
        let out = remove_duplicates(input, &strings(&["key"]));

        assert_eq!(out.row_count(), 7);
        let keys: Vec<&str> = out.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(keys, vec!["k0", "k1", "k2", "k3", "k4", "k5", "k6"]);
        let order: Vec<usize> = out.rows.iter().map(|r| r[1].parse().unwrap()).collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_merge_columns() {
        let input = table(&["first", "last"], &[&["Jane", "Doe"], &["Bob", ""]]);
        let out = merge_columns(input, &strings(&["first", "last"]), " ");
        assert_eq!(out.headers, strings(&["first", "last", "first_last"]));
        assert_eq!(out.rows[0], strings(&["Jane", "Doe", "Jane Doe"]));
        assert_eq!(out.rows[1][2], "Bob");
    }

    #[test]
    fn test_merge_columns_keeps_whitespace_values() {
        let input = table(&["x", "y"], &[&["x", " "]]);
        let out = merge_columns(input, &strings(&["x", "y"]), "|");
        assert_eq!(out.rows[0][2], "x| ");
    }

    #[test]
    fn test_merge_columns_respects_configured_order() {
        let input = table(&["first", "last"], &[&["Jane", "Doe"]]);
        let out = merge_columns(input, &strings(&["last", "first"]), ", ");
        assert_eq!(out.headers[2], "last_first");
        assert_eq!(out.rows[0][2], "Doe, Jane");
    }

    #[test]
    fn test_merge_columns_unresolved_passthrough() {
        let input = table(&["a"], &[&["1"]]);
        let out = merge_columns(input.clone(), &strings(&["x", "y"]), " ");
        assert_eq!(out, input);
    }

    #[test]
    fn test_column_mappings_order_and_exclusion() {
        let input = table(
            &["first", "email", "phone"],
            &[&["Jane", "j@x.com", "555"]],
        );
        let mut mappings = BTreeMap::new();
        mappings.insert("first".to_string(), "Do Not Import".to_string());
        mappings.insert("email".to_string(), "contact_email".to_string());

        let out = apply_column_mappings(input, &mappings).unwrap();
        assert_eq!(out.headers, strings(&["contact_email"]));
        assert_eq!(out.rows[0], strings(&["j@x.com"]));
    }

    #[test]
    fn test_column_mappings_follow_header_order() {
        let input = table(&["a", "b", "c"], &[&["1", "2", "3"]]);
        let mut mappings = BTreeMap::new();
        mappings.insert("c".to_string(), "third".to_string());
        mappings.insert("a".to_string(), "first".to_string());

        let out = apply_column_mappings(input, &mappings).unwrap();
        assert_eq!(out.headers, strings(&["first", "third"]));
        assert_eq!(out.rows[0], strings(&["1", "3"]));
    }

    #[test]
    fn test_column_mappings_never_exceed_non_excluded() {
        let input = table(&["a", "b", "c", "d"], &[&["1", "2", "3", "4"]]);
        let mut mappings = BTreeMap::new();
        mappings.insert("a".to_string(), "A".to_string());
        mappings.insert("b".to_string(), "Do Not Import".to_string());
        mappings.insert("z".to_string(), "Z".to_string());

        let non_excluded = mappings
            .values()
            .filter(|t| !ProcessingConfig::is_excluded(t))
            .count();
        let out = apply_column_mappings(input, &mappings).unwrap();
        assert!(out.column_count() <= non_excluded);
        assert_eq!(out.headers, strings(&["A"]));
    }

    #[test]
    fn test_column_mappings_all_excluded_fails() {
        let input = table(&["a"], &[&["1"]]);
        let mut mappings = BTreeMap::new();
        mappings.insert("a".to_string(), "Do Not Import".to_string());
        assert!(matches!(
            apply_column_mappings(input, &mappings),
            Err(TransformError::NoColumnsMapped)
        ));
    }

    #[test]
    fn test_column_mappings_unknown_columns_fail() {
        let input = table(&["a"], &[&["1"]]);
        let mut mappings = BTreeMap::new();
        mappings.insert("zzz".to_string(), "target".to_string());
        assert!(apply_column_mappings(input, &mappings).is_err());
    }
}
