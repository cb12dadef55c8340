//! Row decoding and the immutable [`Dataset`].
//!
//! Every body line is sliced at the byte offsets given by the schema, each
//! slice is trimmed and decoded by its column type. A missing trailing
//! field is decoded from the empty string, so a `str` column at the end of
//! a line that was right-trimmed reads as `""` while a numeric one fails.

use std::sync::Arc;

use log::{debug, warn};

use crate::error::{Result, SummaryError};
use crate::query::WorkingSet;
use crate::schema::{
    ColumnDescriptor, FormatConfig, HeaderStyle, Schema, column_names, read_typed_header,
};
use crate::types::{ColumnType, Value};

/// One decoded row, one value per schema column.
pub type Row = Vec<Value>;

/// Decoded table, built once per read and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: Schema,
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(schema: Schema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows paired with their column names, e.g. for bulk loading into an
    /// external store.
    pub fn named_rows(&self) -> impl Iterator<Item = NamedRow<'_>> {
        self.rows.iter().map(|values| NamedRow {
            schema: &self.schema,
            values,
        })
    }

    /// A fresh working set over all rows and columns.
    pub fn working_set(self: &Arc<Self>) -> WorkingSet {
        WorkingSet::new(Arc::clone(self))
    }
}

/// A dataset row viewed through its schema.
#[derive(Debug, Clone, Copy)]
pub struct NamedRow<'a> {
    schema: &'a Schema,
    values: &'a [Value],
}

impl<'a> NamedRow<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.schema.index_of(name).map(|i| &self.values[i])
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a ColumnDescriptor, &'a Value)> {
        self.schema.columns().iter().zip(self.values.iter())
    }
}

/// Slice one body line into per-column fields, trimmed.
///
/// Returns the fields and the number of non-blank bytes left over past the
/// last column.
fn split_fields<'l>(
    schema: &Schema,
    line: &'l str,
    line_no: usize,
) -> Result<(Vec<&'l str>, usize)> {
    let bytes = line.trim_end_matches(['\r', '\n']).as_bytes();
    let mut fields = Vec::with_capacity(schema.len());
    let mut pos = 0;

    for col in schema.columns() {
        let start = pos.min(bytes.len());
        let end = (pos + col.byte_width).min(bytes.len());
        let field = std::str::from_utf8(&bytes[start..end]).map_err(|e| {
            SummaryError::malformed(line_no, &col.name, format!("field is not valid UTF-8: {e}"))
        })?;
        fields.push(field.trim());
        pos += col.byte_width;
    }

    let leftover = bytes
        .get(pos..)
        .map(|rest| rest.iter().filter(|b| !b.is_ascii_whitespace()).count())
        .unwrap_or(0);
    Ok((fields, leftover))
}

/// Decode one body line under `schema`. `line_no` is 1-based and only used
/// in errors.
pub fn decode_row(schema: &Schema, line: &str, line_no: usize) -> Result<Row> {
    let (fields, leftover) = split_fields(schema, line, line_no)?;
    if leftover > 0 {
        warn!("Line {line_no}: ignoring {leftover} bytes past the last column");
    }

    schema
        .columns()
        .iter()
        .zip(fields)
        .map(|(col, field)| {
            col.column_type
                .decode(field)
                .map_err(|reason| SummaryError::malformed(line_no, &col.name, reason))
        })
        .collect()
}

/// Decode numbered body lines in order.
pub fn decode_rows<'a, I>(schema: &Schema, lines: I) -> Result<Vec<Row>>
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    lines
        .into_iter()
        .map(|(line_no, line)| decode_row(schema, line, line_no))
        .collect()
}

/// Pick a type for every named column from the body (legacy layout):
/// all integers gives `long`, else all numbers gives `float`, else `str`.
pub fn infer_schema(names: Vec<String>, body: &[(usize, &str)], width: usize) -> Result<Schema> {
    let mut provisional = Vec::with_capacity(names.len());
    for name in &names {
        provisional.push(ColumnDescriptor::new(
            name.clone(),
            ColumnType::FixedString(usize::MAX),
            width,
        ));
    }
    let provisional = Schema::new(provisional)?;

    let mut all_int = vec![true; names.len()];
    let mut all_float = vec![true; names.len()];
    for &(line_no, line) in body {
        let (fields, _) = split_fields(&provisional, line, line_no)?;
        for (i, field) in fields.iter().enumerate() {
            all_int[i] &= field.parse::<i64>().is_ok();
            all_float[i] &= field.parse::<f64>().is_ok();
        }
    }

    let columns = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let column_type = if body.is_empty() {
                ColumnType::FixedString(width)
            } else if all_int[i] {
                ColumnType::Int64
            } else if all_float[i] {
                ColumnType::Float64
            } else {
                ColumnType::FixedString(width)
            };
            ColumnDescriptor::new(name, column_type, width)
        })
        .collect();
    Schema::new(columns)
}

/// Parse a whole summary file: header, then body.
///
/// Blank body lines are skipped. Line numbers in errors are 1-based file
/// line numbers.
pub fn load(text: &str, config: &FormatConfig) -> Result<Dataset> {
    config.validate()?;
    let lines: Vec<(usize, &str)> = text.lines().enumerate().map(|(i, l)| (i + 1, l)).collect();

    let header_len = config.header_lines();
    if lines.len() < header_len {
        return Err(SummaryError::TruncatedHeader {
            expected: header_len,
            found: lines.len(),
        });
    }

    let body: Vec<(usize, &str)> = lines[header_len..]
        .iter()
        .copied()
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();

    let schema = match config.header {
        HeaderStyle::Typed => read_typed_header(lines[0].1, lines[1].1, lines[2].1, config)?,
        HeaderStyle::NamesOnly => {
            let names = column_names(lines[0].1, config);
            infer_schema(names, &body, config.col_width)?
        }
    };
    if schema.is_empty() {
        warn!("Summary header declares no columns");
    }

    let rows = decode_rows(&schema, body.iter().copied())?;
    debug!("Decoded {} rows x {} columns", rows.len(), schema.len());
    Ok(Dataset::new(schema, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(fields: &[&str], width: usize) -> String {
        fields.iter().map(|f| format!("{f:<width$}")).collect()
    }

    fn two_column_file() -> String {
        [
            "# 2.0".to_string(),
            pad(&["#a", "b"], 20),
            pad(&["#int", "float"], 20),
            pad(&["1", "1.5"], 20),
            pad(&["2", "0.5"], 20),
            pad(&["3", "2.5"], 20),
        ]
        .join("\n")
    }

    #[test]
    fn test_load_round_trip() {
        let ds = load(&two_column_file(), &FormatConfig::v2()).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.schema().names(), vec!["a", "b"]);
        assert_eq!(ds.rows()[0], vec![Value::Int32(1), Value::Float64(1.5)]);
        assert_eq!(ds.rows()[1], vec![Value::Int32(2), Value::Float64(0.5)]);
        assert_eq!(ds.rows()[2], vec![Value::Int32(3), Value::Float64(2.5)]);
    }

    #[test]
    fn test_load_skips_blank_body_lines() {
        let text = format!("{}\n\n   \n", two_column_file());
        let ds = load(&text, &FormatConfig::v2()).unwrap();
        assert_eq!(ds.len(), 3);
    }

    #[test]
    fn test_load_truncated_header() {
        let err = load("# 2.0\na", &FormatConfig::v2()).unwrap_err();
        assert!(matches!(
            err,
            SummaryError::TruncatedHeader {
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn test_malformed_row_reports_line_and_column() {
        let text = [
            "# 2.0".to_string(),
            pad(&["a", "b"], 20),
            pad(&["int", "float"], 20),
            pad(&["1", "1.5"], 20),
            pad(&["x", "0.5"], 20),
        ]
        .join("\n");
        match load(&text, &FormatConfig::v2()).unwrap_err() {
            SummaryError::MalformedRow { line, column, .. } => {
                assert_eq!(line, 5);
                assert_eq!(column, "a");
            }
            other => panic!("Expected MalformedRow, got {other:?}"),
        }
    }

    #[test]
    fn test_trimmed_trailing_string_column() {
        let text = [
            "# 2.0".to_string(),
            pad(&["a", "comment"], 20),
            pad(&["int", "str"], 20),
            "7".to_string(),
        ]
        .join("\n");
        let ds = load(&text, &FormatConfig::v2()).unwrap();
        assert_eq!(ds.rows()[0], vec![Value::Int32(7), Value::from("")]);
    }

    #[test]
    fn test_missing_trailing_numeric_column() {
        let text = [
            "# 2.0".to_string(),
            pad(&["a", "b"], 20),
            pad(&["int", "float"], 20),
            "7".to_string(),
        ]
        .join("\n");
        assert!(matches!(
            load(&text, &FormatConfig::v2()),
            Err(SummaryError::MalformedRow { line: 4, .. })
        ));
    }

    #[test]
    fn test_extra_chunks_ignored() {
        let mut line = pad(&["1", "1.5"], 20);
        line.push_str("a long free-form comment");
        let text = [
            "# 2.0".to_string(),
            pad(&["a", "b"], 20),
            pad(&["int", "float"], 20),
            line,
        ]
        .join("\n");
        let ds = load(&text, &FormatConfig::v2()).unwrap();
        assert_eq!(ds.rows()[0].len(), 2);
    }

    #[test]
    fn test_byte_exact_slicing_keeps_inner_spaces() {
        let text = [
            "# 2.0".to_string(),
            pad(&["name", "n"], 20),
            pad(&["str", "int"], 20),
            pad(&["two words", "5"], 20),
        ]
        .join("\n");
        let ds = load(&text, &FormatConfig::v2()).unwrap();
        assert_eq!(ds.rows()[0][0], Value::from("two words"));
        assert_eq!(ds.rows()[0][1], Value::Int32(5));
    }

    #[test]
    fn test_max_columns() {
        let config = FormatConfig::v2().with_max_columns(1);
        let ds = load(&two_column_file(), &config).unwrap();
        assert_eq!(ds.schema().names(), vec!["a"]);
        assert_eq!(ds.rows()[2], vec![Value::Int32(3)]);
    }

    #[test]
    fn test_zero_col_width_rejected() {
        let config = FormatConfig::v2().with_col_width(0);
        assert!(matches!(
            load(&two_column_file(), &config),
            Err(SummaryError::InvalidConfig(_))
        ));
        let config = FormatConfig::legacy().with_col_width(0);
        assert!(matches!(
            load("#a  b\n1  2", &config),
            Err(SummaryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_legacy_inference() {
        let text = [
            pad(&["#mobility", "seed", "mode"], 18),
            pad(&["+1.5e-03", "42", "mc"], 18),
            pad(&["-2.0e-01", "7", "be"], 18),
        ]
        .join("\n");
        let ds = load(&text, &FormatConfig::legacy()).unwrap();
        let types: Vec<ColumnType> = ds.schema().columns().iter().map(|c| c.column_type).collect();
        assert_eq!(
            types,
            vec![ColumnType::Float64, ColumnType::Int64, ColumnType::FixedString(18)]
        );
        assert_eq!(ds.rows()[1][0], Value::Float64(-0.2));
        assert_eq!(ds.rows()[0][1], Value::Int64(42));
    }

    #[test]
    fn test_named_rows() {
        let ds = load(&two_column_file(), &FormatConfig::v2()).unwrap();
        let first = ds.named_rows().next().unwrap();
        assert_eq!(first.get("b"), Some(&Value::Float64(1.5)));
        assert_eq!(first.get("zz"), None);
        let names: Vec<&str> = first.iter().map(|(c, _)| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
