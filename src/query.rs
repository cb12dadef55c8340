//! Chained sort / filter / project over a decoded summary.
//!
//! A [`WorkingSet`] is a list of row indices into a shared, immutable
//! [`Dataset`] plus an optional column projection. `sort` and `filter`
//! reorder or drop indices in place; `get` snapshots the current state into
//! an owned [`ResultSet`] and resets the working set to the full dataset.
//!
//! ```
//! use summary_rs::{Operator, SummaryParser};
//!
//! let text = "\
//! #hop 2.0
//! #a                  b
//! #int                float
//! 1                   1.5
//! 2                   0.5
//! 3                   2.5";
//!
//! let mut parser = SummaryParser::new();
//! let result = parser
//!     .read_str(text)?
//!     .filter("b", 1.0, Operator::Gt)?
//!     .sort("a", false)?
//!     .get()?;
//!
//! assert_eq!(result.len(), 2);
//! # Ok::<(), summary_rs::SummaryError>(())
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, warn};

use crate::decoder::{Dataset, Row, load};
use crate::error::{Result, SummaryError};
use crate::grouping::{Groups, group_by};
use crate::schema::{ColumnDescriptor, FormatConfig, Schema};
use crate::types::Value;

/// Comparison operator accepted by `filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    Gt,
    Ge,
    Lt,
    Le,
    #[default]
    Eq,
    Ne,
    /// `str==` - compare the textual form of both sides
    StrEq,
    /// `str!=` - negation of `str==`
    StrNe,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::StrEq => "str==",
            Operator::StrNe => "str!=",
        }
    }

    /// Does this operator compare text rather than typed values?
    pub fn is_textual(&self) -> bool {
        matches!(self, Operator::StrEq | Operator::StrNe)
    }

    /// Apply the operator to one pair of values.
    ///
    /// Incomparable pairs satisfy only `!=`.
    pub fn evaluate(&self, left: &Value, right: &Value) -> bool {
        use std::cmp::Ordering::*;

        match self {
            Operator::StrEq => left.to_string() == right.to_string(),
            Operator::StrNe => left.to_string() != right.to_string(),
            _ => match (self, left.compare(right)) {
                (Operator::Ne, ord) => ord != Some(Equal),
                (_, None) => false,
                (Operator::Gt, Some(ord)) => ord == Greater,
                (Operator::Ge, Some(ord)) => ord != Less,
                (Operator::Lt, Some(ord)) => ord == Less,
                (Operator::Le, Some(ord)) => ord != Greater,
                (_, Some(ord)) => ord == Equal,
            },
        }
    }
}

impl FromStr for Operator {
    type Err = SummaryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            "==" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            "str==" => Ok(Operator::StrEq),
            "str!=" => Ok(Operator::StrNe),
            _ => Err(SummaryError::UnknownOperator(s.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One side of a filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A column that must exist.
    Column(String),
    /// A typed literal broadcast against every row.
    Literal(Value),
    /// Untyped text: a column if the schema has one by that name, otherwise
    /// a float literal, otherwise a string literal. Textual operators skip
    /// the float step.
    Text(String),
}

impl Operand {
    pub fn column(name: impl Into<String>) -> Self {
        Operand::Column(name.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Operand::Literal(value.into())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Column(name) | Operand::Text(name) => f.write_str(name),
            Operand::Literal(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Text(s.to_string())
    }
}

impl From<String> for Operand {
    fn from(s: String) -> Self {
        Operand::Text(s)
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Literal(v)
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Literal(Value::Float64(v))
    }
}

impl From<i32> for Operand {
    fn from(v: i32) -> Self {
        Operand::Literal(Value::Int32(v))
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Literal(Value::Int64(v))
    }
}

/// An operand bound to the schema.
enum Resolved {
    Column(usize),
    Scalar(Value),
}

impl Resolved {
    fn value<'a>(&'a self, row: &'a Row) -> &'a Value {
        match self {
            Resolved::Column(i) => &row[*i],
            Resolved::Scalar(v) => v,
        }
    }

    fn is_column(&self) -> bool {
        matches!(self, Resolved::Column(_))
    }
}

fn resolve(operand: Operand, schema: &Schema, op: Operator) -> Result<Resolved> {
    match operand {
        Operand::Column(name) => schema.require(&name).map(Resolved::Column),
        Operand::Literal(v) => Ok(Resolved::Scalar(v)),
        Operand::Text(text) => {
            if let Some(i) = schema.index_of(&text) {
                return Ok(Resolved::Column(i));
            }
            if op.is_textual() {
                return Ok(Resolved::Scalar(Value::Str(text)));
            }
            match text.trim().parse::<f64>() {
                Ok(v) => Ok(Resolved::Scalar(Value::Float64(v))),
                Err(_) => {
                    warn!("Operand '{text}' is neither a column nor a number; comparing as string");
                    Ok(Resolved::Scalar(Value::Str(text)))
                }
            }
        }
    }
}

/// Mutable view over a shared dataset.
#[derive(Debug, Clone)]
pub struct WorkingSet {
    dataset: Arc<Dataset>,
    rows: Vec<usize>,
    projection: Option<Vec<usize>>,
}

impl WorkingSet {
    /// Full view: every row in dataset order, every column.
    pub fn new(dataset: Arc<Dataset>) -> Self {
        let rows = (0..dataset.len()).collect();
        Self {
            dataset,
            rows,
            projection: None,
        }
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn schema(&self) -> &Schema {
        self.dataset.schema()
    }

    /// Indices into the dataset, in current order.
    pub fn row_indices(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Reorder rows by ascending `column`.
    ///
    /// The sort is unstable. `descending` reverses the ascending order, so
    /// runs of equal keys come out reversed as well.
    pub fn sort(&mut self, column: &str, descending: bool) -> Result<&mut Self> {
        let col = self.dataset.schema().require(column)?;
        let rows = self.dataset.rows();
        self.rows
            .sort_unstable_by(|&a, &b| rows[a][col].sort_cmp(&rows[b][col]));
        if descending {
            self.rows.reverse();
        }
        debug!(
            "SORT {column}{} over {} rows",
            if descending { " DESC" } else { "" },
            self.rows.len()
        );
        Ok(self)
    }

    /// Keep rows where `left op right` holds.
    ///
    /// At least one side must resolve to a column. When neither does, the
    /// first text operand is reported as an unknown column, and two literals
    /// give `NoColumnOperand`.
    pub fn filter(
        &mut self,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
        op: Operator,
    ) -> Result<&mut Self> {
        let (left, right) = (left.into(), right.into());
        let left_name = left.to_string();
        let schema = self.dataset.schema();
        let unresolved = [&left, &right]
            .into_iter()
            .find(|o| matches!(o, Operand::Text(_)))
            .map(ToString::to_string);
        let right_name = right.to_string();
        let left = resolve(left, schema, op)?;
        let right = resolve(right, schema, op)?;
        if !left.is_column() && !right.is_column() {
            return Err(match unresolved {
                Some(name) => SummaryError::UnknownColumn(name),
                None => SummaryError::NoColumnOperand {
                    left: left_name,
                    right: right_name,
                },
            });
        }

        let before = self.rows.len();
        let rows = self.dataset.rows();
        self.rows.retain(|&i| {
            let row = &rows[i];
            op.evaluate(left.value(row), right.value(row))
        });
        debug!(
            "FILTER {left_name} {op}: {before} -> {} rows",
            self.rows.len()
        );
        Ok(self)
    }

    /// Restrict the columns returned by [`get`](Self::get), in the given
    /// order. An empty list restores all columns.
    pub fn project<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<&mut Self> {
        let schema = self.dataset.schema();
        let indices = columns
            .iter()
            .map(|c| schema.require(c.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.projection = if indices.is_empty() {
            None
        } else {
            Some(indices)
        };
        Ok(self)
    }

    /// Copy out the current rows and columns without resetting.
    pub fn snapshot(&self) -> ResultSet {
        let schema = self.dataset.schema();
        let all: Vec<usize>;
        let cols: &[usize] = match &self.projection {
            Some(p) => p,
            None => {
                all = (0..schema.len()).collect();
                &all
            }
        };

        let columns = cols
            .iter()
            .filter_map(|&c| schema.column(c).cloned())
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|&r| {
                let row = &self.dataset.rows()[r];
                cols.iter().map(|&c| row[c].clone()).collect()
            })
            .collect();
        ResultSet { columns, rows }
    }

    /// Snapshot, then reset to the full dataset.
    pub fn get(&mut self) -> ResultSet {
        let result = self.snapshot();
        self.reset();
        result
    }

    /// Group the current rows by `column`, then reset.
    ///
    /// Rows must already be sorted by `column`; see [`group_by`].
    pub fn group_by(&mut self, column: &str) -> Result<Groups> {
        let key = self.dataset.schema().require(column)?;
        if self.projection.as_ref().is_some_and(|p| !p.contains(&key)) {
            return Err(SummaryError::ProjectedOut(column.to_string()));
        }
        let groups = group_by(&self.snapshot(), column)?;
        self.reset();
        Ok(groups)
    }

    /// Restore every row in dataset order and all columns.
    pub fn reset(&mut self) {
        self.rows.clear();
        self.rows.extend(0..self.dataset.len());
        self.projection = None;
    }
}

/// Owned snapshot returned by `get`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnDescriptor>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// All values of one column, top to bottom.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let i = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[i]).collect())
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reader plus query state for one summary file at a time.
///
/// Every query method returns `&mut Self` so calls chain; `get` and
/// `group_by` end the chain and reset the working set. A failed call leaves
/// the working set as it was.
#[derive(Debug, Clone, Default)]
pub struct SummaryParser {
    config: FormatConfig,
    working: Option<WorkingSet>,
}

impl SummaryParser {
    /// Parser for the current (v2) layout.
    pub fn new() -> Self {
        Self::with_config(FormatConfig::v2())
    }

    /// Parser for the legacy 18-char layout.
    pub fn legacy() -> Self {
        Self::with_config(FormatConfig::legacy())
    }

    pub fn with_config(config: FormatConfig) -> Self {
        Self {
            config,
            working: None,
        }
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    /// Read a summary file from disk.
    pub fn read(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        debug!("Reading summary {}", path.display());
        let text = fs::read_to_string(path)?;
        self.read_str(&text)
    }

    /// Parse summary text. On error the previously loaded dataset, if any,
    /// is kept.
    pub fn read_str(&mut self, text: &str) -> Result<&mut Self> {
        let dataset = load(text, &self.config)?;
        self.working = Some(WorkingSet::new(Arc::new(dataset)));
        Ok(self)
    }

    pub fn is_loaded(&self) -> bool {
        self.working.is_some()
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.working.as_ref().map(WorkingSet::dataset)
    }

    pub fn working_set(&self) -> Result<&WorkingSet> {
        self.working.as_ref().ok_or(SummaryError::NotLoaded)
    }

    fn working_mut(&mut self) -> Result<&mut WorkingSet> {
        self.working.as_mut().ok_or(SummaryError::NotLoaded)
    }

    /// Column names in file order.
    pub fn columns(&self) -> Result<Vec<&str>> {
        Ok(self.working_set()?.schema().names())
    }

    pub fn sort(&mut self, column: &str, descending: bool) -> Result<&mut Self> {
        self.working_mut()?.sort(column, descending)?;
        Ok(self)
    }

    pub fn filter(
        &mut self,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
        op: Operator,
    ) -> Result<&mut Self> {
        self.working_mut()?.filter(left, right, op)?;
        Ok(self)
    }

    pub fn project<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<&mut Self> {
        self.working_mut()?.project(columns)?;
        Ok(self)
    }

    pub fn get(&mut self) -> Result<ResultSet> {
        Ok(self.working_mut()?.get())
    }

    /// `project(columns)` followed by `get()`.
    pub fn get_columns<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<ResultSet> {
        let working = self.working_mut()?;
        working.project(columns)?;
        Ok(working.get())
    }

    pub fn group_by(&mut self, column: &str) -> Result<Groups> {
        self.working_mut()?.group_by(column)
    }

    /// Restore the full dataset. A no-op before the first read.
    pub fn reset(&mut self) -> &mut Self {
        if let Some(working) = self.working.as_mut() {
            working.reset();
        }
        self
    }
}
