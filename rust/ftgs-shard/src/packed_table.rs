//! Accessor trait for a shard's per-document row store.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

/// Per-document row store of a shard: one group id and `col_count` integer
/// stat columns per document, indexed by doc id.
///
/// The packing scheme is owned by the implementation. Workers of one run read
/// the same table concurrently, so implementations must be thread-safe.
///
/// Row and column indices must be in range; implementations may panic
/// otherwise. Callers check doc ids against [`row_count`](Self::row_count)
/// before reading.
pub trait PackedTable: Send + Sync {
    fn row_count(&self) -> usize;

    fn col_count(&self) -> usize;

    fn get_cell(&self, row: usize, col: usize) -> i64;

    fn set_cell(&self, row: usize, col: usize, value: i64);

    fn get_group(&self, row: usize) -> u32;

    fn set_group(&self, row: usize, group: u32);

    /// Presence bit of a cell, used for binary metrics.
    fn get_bit(&self, row: usize, col: usize) -> bool {
        self.get_cell(row, col) != 0
    }
}

/// A `PackedTable` held in memory as unpacked atomics.
///
/// Used by tests and by hosts that do not bring their own table.
pub struct MemoryTable {
    rows: usize,
    cols: usize,
    cells: Vec<AtomicI64>,
    groups: Vec<AtomicU32>,
}

impl MemoryTable {
    /// Creates a zeroed table; every document starts in group 0.
    pub fn new(rows: usize, cols: usize) -> MemoryTable {
        MemoryTable {
            rows,
            cols,
            cells: (0..rows * cols).map(|_| AtomicI64::new(0)).collect(),
            groups: (0..rows).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Creates a table from `(group, cells)` rows. Rows shorter than `cols`
    /// are zero-padded.
    pub fn from_rows<'a>(
        cols: usize,
        rows: impl IntoIterator<Item = (u32, &'a [i64])>,
    ) -> MemoryTable {
        let rows = rows.into_iter().collect::<Vec<_>>();
        let table = MemoryTable::new(rows.len(), cols);
        for (row, (group, cells)) in rows.into_iter().enumerate() {
            table.set_group(row, group);
            for (col, &value) in cells.iter().take(cols).enumerate() {
                table.set_cell(row, col, value);
            }
        }
        table
    }

    fn cell(&self, row: usize, col: usize) -> &AtomicI64 {
        assert!(col < self.cols, "column {col} out of range ({})", self.cols);
        &self.cells[row * self.cols + col]
    }
}

impl PackedTable for MemoryTable {
    fn row_count(&self) -> usize {
        self.rows
    }

    fn col_count(&self) -> usize {
        self.cols
    }

    fn get_cell(&self, row: usize, col: usize) -> i64 {
        self.cell(row, col).load(Ordering::Relaxed)
    }

    fn set_cell(&self, row: usize, col: usize, value: i64) {
        self.cell(row, col).store(value, Ordering::Relaxed);
    }

    fn get_group(&self, row: usize) -> u32 {
        self.groups[row].load(Ordering::Relaxed)
    }

    fn set_group(&self, row: usize, group: u32) {
        self.groups[row].store(group, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for MemoryTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTable")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}
