//! Fixed-width header parsing.
//!
//! Layout of a summary file written by the simulator (v2, 20-char columns):
//!
//! ```text
//! #hop 2.0
//! #mode               temperature         number_sites        ...
//! #str                float               long                ...
//! mc                  +3.000000e-01       1000000             ...
//! ```
//!
//! - line 1: marker and format version (second whitespace token)
//! - line 2: column names, one per `col_width` chunk
//! - line 3: type tags, one per `col_width` chunk
//!
//! Leading `#` markers and surrounding whitespace are stripped from every
//! header chunk. The legacy layout (18-char columns) only has the names
//! line; its types are inferred from the body by the decoder.

use log::debug;

use crate::error::{Result, SummaryError};
use crate::types::ColumnType;

/// Format version written by current simulator builds.
pub const SUMMARY_VERSION: f64 = 2.0;

/// Column width of the v2 summary layout.
pub const COLUMN_WIDTH: usize = 20;

/// Column width of the legacy summary layout.
pub const LEGACY_COLUMN_WIDTH: usize = 18;

/// Which header lines precede the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStyle {
    /// Version line, names line, type line.
    Typed,
    /// A single names line; column types are inferred from the body.
    NamesOnly,
}

/// Layout parameters for one summary file format.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatConfig {
    pub col_width: usize,
    /// Expected version token. Ignored for [`HeaderStyle::NamesOnly`].
    pub version: f64,
    pub header: HeaderStyle,
    /// Read only the first N columns of every line.
    pub max_columns: Option<usize>,
}

impl FormatConfig {
    /// Current three-line layout with 20-char columns.
    pub fn v2() -> Self {
        Self {
            col_width: COLUMN_WIDTH,
            version: SUMMARY_VERSION,
            header: HeaderStyle::Typed,
            max_columns: None,
        }
    }

    /// Legacy layout: 18-char columns, names line only.
    pub fn legacy() -> Self {
        Self {
            col_width: LEGACY_COLUMN_WIDTH,
            version: SUMMARY_VERSION,
            header: HeaderStyle::NamesOnly,
            max_columns: None,
        }
    }

    pub fn with_col_width(mut self, col_width: usize) -> Self {
        self.col_width = col_width;
        self
    }

    pub fn with_version(mut self, version: f64) -> Self {
        self.version = version;
        self
    }

    pub fn with_max_columns(mut self, max_columns: usize) -> Self {
        self.max_columns = Some(max_columns);
        self
    }

    /// Reject layouts no file can have.
    pub fn validate(&self) -> Result<()> {
        if self.col_width == 0 {
            return Err(SummaryError::InvalidConfig(
                "column width must be at least 1".to_string(),
            ));
        }
        if self.max_columns == Some(0) {
            return Err(SummaryError::InvalidConfig(
                "max_columns must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of lines consumed by the header.
    pub fn header_lines(&self) -> usize {
        match self.header {
            HeaderStyle::Typed => 3,
            HeaderStyle::NamesOnly => 1,
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self::v2()
    }
}

/// Name, type and width of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
    pub byte_width: usize,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, column_type: ColumnType, byte_width: usize) -> Self {
        Self {
            name: name.into(),
            column_type,
            byte_width,
        }
    }
}

/// Ordered column descriptors of one file, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: Vec<ColumnDescriptor>,
}

impl Schema {
    /// Build a schema, rejecting duplicate names.
    pub fn new(columns: Vec<ColumnDescriptor>) -> Result<Self> {
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(SummaryError::DuplicateColumn(col.name.clone()));
            }
        }
        Ok(Self { columns })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(index)
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Like [`index_of`](Self::index_of) but fails with `UnknownColumn`.
    pub fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name)
            .ok_or_else(|| SummaryError::UnknownColumn(name.to_string()))
    }
}

/// Split a line into `width`-byte chunks. The last chunk may be shorter.
///
/// `width` must be non-zero; [`FormatConfig::validate`] guards this for
/// every config that reaches the reader.
pub fn fixed_chunks(line: &str, width: usize) -> std::slice::Chunks<'_, u8> {
    line.trim_end_matches(['\r', '\n'])
        .as_bytes()
        .chunks(width.max(1))
}

/// Clean one header chunk: strip `#` markers and whitespace at both ends,
/// join inner whitespace with `_`.
fn header_token(chunk: &[u8]) -> String {
    let text = String::from_utf8_lossy(chunk);
    text.trim_matches(|c: char| c == '#' || c.is_whitespace())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Parse a names or type-tag line into cleaned tokens.
///
/// Trailing whitespace of the line is dropped first, so the final chunk may
/// be shorter than `col_width`. Honors `max_columns`.
pub fn header_fields(line: &str, config: &FormatConfig) -> Vec<String> {
    let fields = fixed_chunks(line.trim_end(), config.col_width).map(header_token);
    match config.max_columns {
        Some(n) => fields.take(n).collect(),
        None => fields.collect(),
    }
}

/// Column names from a names line. Blank chunks are named `f<index>`.
pub fn column_names(line: &str, config: &FormatConfig) -> Vec<String> {
    header_fields(line, config)
        .into_iter()
        .enumerate()
        .map(|(i, name)| if name.is_empty() { format!("f{i}") } else { name })
        .collect()
}

/// Check the version token (second whitespace-separated token of line 1).
pub fn check_version(line: &str, config: &FormatConfig) -> Result<()> {
    let found = line.split_whitespace().nth(1).unwrap_or("");
    match found.parse::<f64>() {
        Ok(v) if v == config.version => Ok(()),
        _ => Err(SummaryError::VersionMismatch {
            expected: config.version,
            found: found.to_string(),
        }),
    }
}

/// Read the three-line typed header into a schema.
pub fn read_typed_header(
    version_line: &str,
    names_line: &str,
    types_line: &str,
    config: &FormatConfig,
) -> Result<Schema> {
    check_version(version_line, config)?;

    let names = column_names(names_line, config);
    let tags = header_fields(types_line, config);
    if names.len() != tags.len() {
        return Err(SummaryError::ColumnCountMismatch {
            names: names.len(),
            types: tags.len(),
        });
    }

    let columns = names
        .into_iter()
        .zip(tags)
        .map(|(name, tag)| {
            let column_type = ColumnType::from_tag(&tag, &name, config.col_width)?;
            Ok(ColumnDescriptor::new(name, column_type, config.col_width))
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "Read typed header: {} columns of width {}",
        columns.len(),
        config.col_width
    );
    Schema::new(columns)
}
