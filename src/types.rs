//! Column types and typed values.
//!
//! A header type tag (`int`, `long`, `float`, `str`, `datetime`) is resolved
//! once into a [`ColumnType`]. The column type owns the decode step for a
//! trimmed field, and [`Value`] owns the comparison semantics used by
//! sorting and filtering:
//!
//! - integers and floats compare numerically, across widths
//! - strings compare lexicographically
//! - datetimes compare chronologically (a string operand is parsed as a
//!   datetime when compared against one)
//! - anything else is incomparable

use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Result, SummaryError};

/// Formats accepted for `datetime` fields, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d_%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// `int` - 32-bit signed integer
    Int32,
    /// `long` - 64-bit signed integer
    Int64,
    /// `float` - 64-bit floating point
    Float64,
    /// `str` - string of at most `width` characters, trimmed on read
    FixedString(usize),
    /// `datetime` - timestamp with second resolution
    DateTime,
}

impl ColumnType {
    /// Map a header type tag to a column type.
    ///
    /// `width` is the column width of the file format and sizes `str`
    /// columns. `column` is only used for the error message.
    pub fn from_tag(tag: &str, column: &str, width: usize) -> Result<Self> {
        match tag {
            "int" => Ok(ColumnType::Int32),
            "long" => Ok(ColumnType::Int64),
            "float" => Ok(ColumnType::Float64),
            "str" => Ok(ColumnType::FixedString(width)),
            "datetime" => Ok(ColumnType::DateTime),
            _ => Err(SummaryError::UnknownType {
                tag: tag.to_string(),
                column: column.to_string(),
            }),
        }
    }

    /// The header tag for this type.
    pub fn tag(&self) -> &'static str {
        match self {
            ColumnType::Int32 => "int",
            ColumnType::Int64 => "long",
            ColumnType::Float64 => "float",
            ColumnType::FixedString(_) => "str",
            ColumnType::DateTime => "datetime",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Int32 | ColumnType::Int64 | ColumnType::Float64
        )
    }

    /// Decode an already trimmed field.
    ///
    /// On failure returns a short reason; the caller attaches line and
    /// column information.
    pub fn decode(&self, field: &str) -> std::result::Result<Value, String> {
        match self {
            ColumnType::Int32 => field
                .parse::<i32>()
                .map(Value::Int32)
                .map_err(|e| format!("'{field}' is not an int: {e}")),
            ColumnType::Int64 => field
                .parse::<i64>()
                .map(Value::Int64)
                .map_err(|e| format!("'{field}' is not a long: {e}")),
            ColumnType::Float64 => field
                .parse::<f64>()
                .map(Value::Float64)
                .map_err(|e| format!("'{field}' is not a float: {e}")),
            ColumnType::FixedString(width) => {
                if field.chars().count() > *width {
                    Err(format!("'{field}' is wider than {width} characters"))
                } else {
                    Ok(Value::Str(field.to_string()))
                }
            }
            ColumnType::DateTime => parse_datetime(field)
                .map(Value::DateTime)
                .ok_or_else(|| format!("'{field}' is not a datetime")),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Parse a timestamp in any of the accepted layouts. A bare date means
/// midnight.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Str(String),
    DateTime(NaiveDateTime),
}

impl Value {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Compare two values under their natural semantics.
    ///
    /// Returns `None` when the values are incomparable (mismatched kinds,
    /// NaN, or a string that does not parse as a datetime).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_i64(), other.as_i64()) {
            return Some(a.cmp(&b));
        }
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.partial_cmp(&b);
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::Str(b)) => parse_datetime(b).map(|b| a.cmp(&b)),
            (Value::Str(a), Value::DateTime(b)) => parse_datetime(a).map(|a| a.cmp(b)),
            _ => None,
        }
    }

    /// Total order used for sorting a single column. NaN of either sign
    /// sorts after every number; incomparable pairs are treated as equal.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Float64(a), Value::Float64(b)) => match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => a.total_cmp(b),
            },
            _ => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d_%H:%M:%S")),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}
