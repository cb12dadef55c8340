//! # summary-rs
//!
//! Typed reader and query pipeline for the fixed-width summary files
//! written by the hopping transport simulator.
//!
//! ## Overview
//!
//! A summary file is a table with one simulation run per line:
//! - **Fixed-width columns**: 20 characters per field (18 in the legacy layout)
//! - **Self-describing header**: version line, column names, column types
//! - **Typed values**: `int`, `long`, `float`, `str` and `datetime`
//!
//! The file is decoded once into an immutable [`Dataset`]. Queries run over
//! a [`WorkingSet`], a resettable view of the dataset that chained `sort`,
//! `filter` and `project` calls narrow down until `get` takes a snapshot.
//!
//! ## Example
//!
//! ```
//! use summary_rs::{Operator, SummaryParser, Value};
//!
//! let text = [
//!     "#hop 2.0",
//!     "#mode               temperature         mobility",
//!     "#str                float               float",
//!     "mc                  +3.000000e-01       +1.520000e-03",
//!     "be                  +3.000000e-01       +1.490000e-03",
//!     "mc                  +5.000000e-01       +8.730000e-03",
//! ]
//! .join("\n");
//!
//! let mut parser = SummaryParser::new();
//! let result = parser
//!     .read_str(&text)?
//!     .filter("mode", "mc", Operator::Eq)?
//!     .sort("mobility", true)?
//!     .project(&["temperature"])?
//!     .get()?;
//!
//! assert_eq!(result.rows()[0], vec![Value::Float64(0.5)]);
//! # Ok::<(), summary_rs::SummaryError>(())
//! ```

pub mod decoder;
pub mod dsl;
pub mod error;
pub mod grouping;
pub mod query;
pub mod schema;
pub mod types;

pub use decoder::{Dataset, NamedRow, Row, decode_row, decode_rows, load};
pub use dsl::{Command, QueryOutput, execute_query, parse_commands, run_commands};
pub use error::{Result, SummaryError};
pub use grouping::{Group, Groups, group_by};
pub use query::{Operand, Operator, ResultSet, SummaryParser, WorkingSet};
pub use schema::{
    COLUMN_WIDTH, ColumnDescriptor, FormatConfig, HeaderStyle, LEGACY_COLUMN_WIDTH,
    SUMMARY_VERSION, Schema,
};
pub use types::{ColumnType, Value};
