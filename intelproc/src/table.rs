// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Numeric tables and the index-keyed caches built from them

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CacheValue;
use crate::error::{ProcessorError, ProcessorResult};

/// Single column of every prediction cache
pub const PREDICTION_COLUMN: &str = "prediction";

/// Per-row system columns (record id and timestamp)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemData {
    pub ids: Vec<Option<String>>,
    pub timestamps: Vec<Option<DateTime<Utc>>>,
}

/// Row-major table of `f64` values with a record index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericTable {
    pub index: Vec<usize>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub system: Option<SystemData>,
}

impl NumericTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    /// Build a table, checking that every row matches the column count.
    pub fn from_rows(
        index: Vec<usize>,
        columns: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> ProcessorResult<Self> {
        let table = Self {
            index,
            columns,
            rows,
            system: None,
        };
        table.check_shape()?;
        Ok(table)
    }

    /// Check that every row has one value per column and one index entry.
    /// Tables built from deserialized input may be ragged.
    pub fn check_shape(&self) -> ProcessorResult<()> {
        if self.index.len() != self.rows.len() {
            return Err(ProcessorError::InvalidArgument(format!(
                "Index has {} entries but table has {} rows",
                self.index.len(),
                self.rows.len()
            )));
        }
        if let Some(row) = self.rows.iter().find(|row| row.len() != self.columns.len()) {
            return Err(ProcessorError::InvalidArgument(format!(
                "Row has {} values but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        Ok(())
    }

    /// Single-column table of consecutive records starting at `start`
    pub fn single_column(name: impl Into<String>, start: usize, values: Vec<f64>) -> Self {
        Self {
            index: (start..start + values.len()).collect(),
            columns: vec![name.into()],
            rows: values.into_iter().map(|value| vec![value]).collect(),
            system: None,
        }
    }

    pub fn with_system_data(mut self, system: SystemData) -> Self {
        self.system = Some(system);
        self
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn position(&self, name: &str) -> ProcessorResult<usize> {
        self.columns
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| ProcessorError::NotFound(format!("Column {} not in table", name)))
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let position = self.position(name).ok()?;
        self.rows.iter().map(|row| row.get(position).copied()).collect()
    }

    pub fn set_column(&mut self, name: &str, values: Vec<f64>) -> ProcessorResult<()> {
        if values.len() != self.rows.len() {
            return Err(ProcessorError::InvalidArgument(format!(
                "Column {} expects {} values, got {}",
                name,
                self.rows.len(),
                values.len()
            )));
        }
        self.check_shape()?;
        let position = self.position(name)?;
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[position] = value;
        }
        Ok(())
    }

    pub fn map_column(&mut self, name: &str, f: impl Fn(f64) -> f64) -> ProcessorResult<()> {
        self.check_shape()?;
        let position = self.position(name)?;
        for row in &mut self.rows {
            row[position] = f(row[position]);
        }
        Ok(())
    }

    /// Rename a column. Returns false when `from` does not exist.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.columns.iter_mut().find(|column| column.as_str() == from) {
            Some(column) => {
                *column = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Re-index rows consecutively from `start`.
    pub fn with_index(mut self, start: usize) -> Self {
        self.index = (start..start + self.rows.len()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CachedRow {
    values: Vec<f64>,
    id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

/// Partially populated, index-keyed cache of numeric rows.
///
/// Holds prediction scores (one [`PREDICTION_COLUMN`]) or feature
/// influences (one column per feature).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericTableCache {
    columns: Vec<String>,
    unique_id_column: Option<String>,
    timestamp_column: Option<String>,
    rows: BTreeMap<usize, CachedRow>,
    updated_on: DateTime<Utc>,
}

impl NumericTableCache {
    pub fn new(
        columns: Vec<String>,
        unique_id_column: Option<String>,
        timestamp_column: Option<String>,
    ) -> Self {
        Self {
            columns,
            unique_id_column,
            timestamp_column,
            rows: BTreeMap::new(),
            updated_on: Utc::now(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_system_columns(&self) -> bool {
        self.unique_id_column.is_some() || self.timestamp_column.is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Time of the last insertion (or of the persisted data it was loaded from)
    pub fn updated_on(&self) -> DateTime<Utc> {
        self.updated_on
    }

    pub fn set_updated_on(&mut self, updated_on: DateTime<Utc>) {
        self.updated_on = updated_on;
    }

    pub fn contains_index(&self, index: usize) -> bool {
        self.rows.contains_key(&index)
    }

    /// True if every index in `[start, stop)` is cached. Empty ranges are
    /// always covered.
    pub fn contains_index_range(&self, start: usize, stop: usize) -> bool {
        if stop <= start {
            return true;
        }
        self.rows.range(start..stop).count() == stop - start
    }

    pub fn get_value(&self, index: usize, include_system_data: bool) -> Option<NumericTable> {
        if !self.contains_index(index) {
            return None;
        }
        self.get_values(index, index + 1, include_system_data)
    }

    /// Rows `[start, stop)`, or `None` unless the whole range is cached.
    pub fn get_values(
        &self,
        start: usize,
        stop: usize,
        include_system_data: bool,
    ) -> Option<NumericTable> {
        if !self.contains_index_range(start, stop) {
            return None;
        }
        let mut table = NumericTable::new(self.columns.clone());
        let mut system = SystemData::default();
        for (&index, row) in self.rows.range(start..stop.max(start)) {
            table.index.push(index);
            table.rows.push(row.values.clone());
            system.ids.push(row.id.clone());
            system.timestamps.push(row.timestamp);
        }
        if include_system_data && self.has_system_columns() {
            table.system = Some(system);
        }
        Some(table)
    }

    /// Insert (or overwrite) the rows of `table` at its index.
    pub fn insert_table(&mut self, table: &NumericTable) -> ProcessorResult<()> {
        table.check_shape()?;
        let positions = self
            .columns
            .iter()
            .map(|column| {
                table.columns.iter().position(|c| c == column).ok_or_else(|| {
                    ProcessorError::InvalidArgument(format!(
                        "Table is missing cached column {}",
                        column
                    ))
                })
            })
            .collect::<ProcessorResult<Vec<_>>>()?;

        for (offset, (&index, row)) in table.index.iter().zip(&table.rows).enumerate() {
            let values = positions.iter().map(|&p| row[p]).collect();
            let (id, timestamp) = match &table.system {
                Some(system) => (
                    system.ids.get(offset).cloned().flatten(),
                    system.timestamps.get(offset).copied().flatten(),
                ),
                None => (None, None),
            };
            self.rows.insert(
                index,
                CachedRow {
                    values,
                    id,
                    timestamp,
                },
            );
        }
        self.updated_on = Utc::now();
        Ok(())
    }

    /// Fold rows loaded from persistent storage into this cache. Existing
    /// rows win. An empty cache adopts the other's timestamp; otherwise the
    /// older timestamp is kept.
    pub fn merge_from(&mut self, other: NumericTableCache) {
        let was_empty = self.rows.is_empty();
        for (index, row) in other.rows {
            self.rows.entry(index).or_insert(row);
        }
        if was_empty {
            self.updated_on = other.updated_on;
        } else if other.updated_on < self.updated_on {
            self.updated_on = other.updated_on;
        }
    }
}

impl CacheValue for NumericTableCache {
    fn size_bytes(&self) -> usize {
        let header = std::mem::size_of::<Self>()
            + self.columns.iter().map(|c| c.len()).sum::<usize>();
        let row_overhead = std::mem::size_of::<usize>() + std::mem::size_of::<CachedRow>();
        let rows = self
            .rows
            .values()
            .map(|row| {
                row_overhead
                    + row.values.len() * std::mem::size_of::<f64>()
                    + row.id.as_ref().map_or(0, |id| id.len())
            })
            .sum::<usize>();
        header + rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictions(start: usize, values: Vec<f64>) -> NumericTable {
        NumericTable::single_column(PREDICTION_COLUMN, start, values)
    }

    fn empty_cache() -> NumericTableCache {
        NumericTableCache::new(vec![PREDICTION_COLUMN.to_string()], None, None)
    }

    #[test]
    fn test_range_coverage() {
        let mut cache = empty_cache();
        cache.insert_table(&predictions(0, vec![0.1, 0.2, 0.3])).unwrap();
        cache.insert_table(&predictions(5, vec![0.6])).unwrap();

        assert!(cache.contains_index_range(0, 3));
        assert!(!cache.contains_index_range(0, 4));
        assert!(cache.contains_index_range(5, 6));
        assert!(cache.contains_index_range(9, 9));
        assert!(cache.get_values(0, 6, false).is_none());

        let table = cache.get_values(1, 3, false).unwrap();
        assert_eq!(table.index, vec![1, 2]);
        assert_eq!(table.column(PREDICTION_COLUMN).unwrap(), vec![0.2, 0.3]);
    }

    #[test]
    fn test_system_data_only_when_requested() {
        let mut cache = NumericTableCache::new(
            vec![PREDICTION_COLUMN.to_string()],
            Some("id".to_string()),
            None,
        );
        let table = predictions(0, vec![1.0]).with_system_data(SystemData {
            ids: vec![Some("rec-0".to_string())],
            timestamps: vec![None],
        });
        cache.insert_table(&table).unwrap();

        assert!(cache.get_value(0, false).unwrap().system.is_none());
        let with_system = cache.get_value(0, true).unwrap();
        assert_eq!(
            with_system.system.unwrap().ids,
            vec![Some("rec-0".to_string())]
        );
    }

    #[test]
    fn test_insert_requires_cached_columns() {
        let mut cache = NumericTableCache::new(vec!["age".to_string()], None, None);
        let result = cache.insert_table(&predictions(0, vec![1.0]));
        assert!(matches!(result, Err(ProcessorError::InvalidArgument(_))));
    }

    #[test]
    fn test_ragged_rows_rejected_on_insert() {
        let table: NumericTable =
            serde_json::from_str(r#"{"index":[0],"columns":["prediction"],"rows":[[]]}"#)
                .unwrap();
        let mut cache = empty_cache();

        let result = cache.insert_table(&table);

        assert!(matches!(result, Err(ProcessorError::InvalidArgument(_))));
        assert!(cache.is_empty());
        assert!(table.column(PREDICTION_COLUMN).is_none());
    }

    #[test]
    fn test_index_length_mismatch_rejected() {
        let mut table = predictions(0, vec![1.0, 2.0]);
        table.index.pop();

        assert!(empty_cache().insert_table(&table).is_err());
        assert!(matches!(
            table.map_column(PREDICTION_COLUMN, |v| v + 1.0),
            Err(ProcessorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_merge_keeps_existing_rows_and_older_timestamp() {
        let mut loaded = empty_cache();
        loaded.insert_table(&predictions(0, vec![9.0, 9.0])).unwrap();
        let loaded_on = loaded.updated_on() - chrono::Duration::hours(1);
        loaded.set_updated_on(loaded_on);

        let mut cache = empty_cache();
        cache.insert_table(&predictions(0, vec![1.0])).unwrap();
        cache.merge_from(loaded);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_value(0, false).unwrap().rows, vec![vec![1.0]]);
        assert_eq!(cache.updated_on(), loaded_on);
    }

    #[test]
    fn test_merge_into_empty_adopts_timestamp() {
        let mut loaded = empty_cache();
        loaded.insert_table(&predictions(0, vec![1.0])).unwrap();
        let stamp = loaded.updated_on() + chrono::Duration::hours(1);
        loaded.set_updated_on(stamp);

        let mut cache = empty_cache();
        cache.merge_from(loaded);
        assert_eq!(cache.updated_on(), stamp);
    }

    #[test]
    fn test_table_column_operations() {
        let mut table = predictions(0, vec![1.0, 2.0]);
        table.map_column(PREDICTION_COLUMN, |v| v * 10.0).unwrap();
        assert_eq!(table.column(PREDICTION_COLUMN).unwrap(), vec![10.0, 20.0]);
        assert!(table.set_column(PREDICTION_COLUMN, vec![1.0]).is_err());

        assert!(table.rename_column(PREDICTION_COLUMN, "Result"));
        assert!(table.column(PREDICTION_COLUMN).is_none());
        let table = table.with_index(7);
        assert_eq!(table.index, vec![7, 8]);
    }

    #[test]
    fn test_size_grows_with_rows() {
        let mut cache = empty_cache();
        let empty_size = cache.size_bytes();
        cache.insert_table(&predictions(0, vec![0.0; 100])).unwrap();
        assert!(cache.size_bytes() >= empty_size + 100 * std::mem::size_of::<f64>());
    }
}
