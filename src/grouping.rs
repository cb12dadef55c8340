//! Partition a result into runs of equal key values.
//!
//! Grouping is run-based: consecutive rows with the same key form one
//! group, so the input should already be sorted by the key column. When a
//! key shows up again in a later run, the later run replaces the earlier
//! group (its position in the output is kept).

use log::warn;

use crate::error::{Result, SummaryError};
use crate::query::ResultSet;
use crate::types::Value;

/// Rows sharing one key, stored column-major without the key column.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: Value,
    /// Names of the non-key columns, in result order.
    pub columns: Vec<String>,
    /// `values[c][r]` is column `c` of the group's `r`-th row.
    pub values: Vec<Vec<Value>>,
    /// Number of rows in the group.
    pub rows: usize,
}

impl Group {
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
    }
}

/// Groups keyed by value, in order of first appearance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Groups {
    groups: Vec<Group>,
}

impl Groups {
    pub fn get(&self, key: &Value) -> Option<&Group> {
        self.groups.iter().find(|g| &g.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.groups.iter().map(|g| &g.key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Group> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn insert(&mut self, group: Group) {
        match self.groups.iter_mut().find(|g| g.key == group.key) {
            Some(existing) => {
                warn!(
                    "Group key '{}' appears in more than one run; input is not sorted by the key",
                    group.key
                );
                *existing = group;
            }
            None => self.groups.push(group),
        }
    }
}

impl<'a> IntoIterator for &'a Groups {
    type Item = &'a Group;
    type IntoIter = std::slice::Iter<'a, Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Group the rows of `result` by consecutive runs of `column`.
pub fn group_by(result: &ResultSet, column: &str) -> Result<Groups> {
    let key_idx = result
        .column_index(column)
        .ok_or_else(|| SummaryError::UnknownColumn(column.to_string()))?;

    let value_cols: Vec<usize> = (0..result.columns().len())
        .filter(|&c| c != key_idx)
        .collect();
    let columns: Vec<String> = value_cols
        .iter()
        .map(|&c| result.columns()[c].name.clone())
        .collect();

    let mut groups = Groups::default();
    let mut current: Option<Group> = None;

    for row in result.rows() {
        let key = &row[key_idx];
        let same_run = current.as_ref().is_some_and(|g| &g.key == key);
        if !same_run {
            if let Some(done) = current.take() {
                groups.insert(done);
            }
            current = Some(Group {
                key: key.clone(),
                columns: columns.clone(),
                values: vec![Vec::new(); value_cols.len()],
                rows: 0,
            });
        }
        if let Some(group) = current.as_mut() {
            group.rows += 1;
            for (dst, &c) in group.values.iter_mut().zip(&value_cols) {
                dst.push(row[c].clone());
            }
        }
    }
    if let Some(done) = current {
        groups.insert(done);
    }

    Ok(groups)
}
