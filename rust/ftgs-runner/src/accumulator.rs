//! Per-term group statistics.

use ftgs_common::{Result, error::Error};
use ftgs_shard::packed_table::PackedTable;

/// Dense `num_groups x num_stats` accumulator for the documents of one term.
///
/// Only the touched groups are cleared between terms, so reusing one
/// accumulator for all terms of a split costs O(touched groups) per term.
/// Group 0 holds filtered-out documents and is never accumulated.
pub struct GroupStats {
    num_groups: usize,
    num_stats: usize,
    binary: bool,
    sums: Vec<i64>,
    touched: Vec<u32>,
    seen: Vec<bool>,
    scratch: Vec<i64>,
}

impl GroupStats {
    /// With `binary` set, each stat counts the documents whose cell is
    /// non-zero instead of summing the cells.
    pub fn new(num_groups: usize, num_stats: usize, binary: bool) -> GroupStats {
        GroupStats {
            num_groups,
            num_stats,
            binary,
            sums: vec![0; num_groups * num_stats],
            touched: Vec::new(),
            seen: vec![false; num_groups],
            scratch: Vec::new(),
        }
    }

    pub fn num_stats(&self) -> usize {
        self.num_stats
    }

    /// Adds row `row` of `table` to the stats of its group.
    ///
    /// Rows beyond the table and groups outside `0..num_groups` are
    /// malformed data; `element` names the source in the error.
    pub fn add_row(
        &mut self,
        table: &dyn PackedTable,
        row: i64,
        element: &dyn Fn() -> String,
    ) -> Result<()> {
        let row = usize::try_from(row)
            .ok()
            .filter(|&r| r < table.row_count())
            .ok_or_else(|| {
                Error::invalid_format(
                    element(),
                    format!("doc id {row} beyond the table ({} rows)", table.row_count()),
                )
            })?;
        let group = table.get_group(row);
        if group == 0 {
            return Ok(());
        }
        let g = group as usize;
        if g >= self.num_groups {
            return Err(Error::invalid_format(
                element(),
                format!("doc {row} is in group {group}, num_groups is {}", self.num_groups),
            ));
        }
        if !self.seen[g] {
            self.seen[g] = true;
            self.touched.push(group);
        }
        let sums = &mut self.sums[g * self.num_stats..(g + 1) * self.num_stats];
        for (col, sum) in sums.iter_mut().enumerate() {
            let value = if self.binary {
                table.get_bit(row, col) as i64
            } else {
                table.get_cell(row, col)
            };
            *sum = sum.wrapping_add(value);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.touched.is_empty()
    }

    /// Returns the touched groups in ascending order and their stats,
    /// group-major.
    pub fn sorted_stats(&mut self) -> (&[u32], &[i64]) {
        self.touched.sort_unstable();
        self.scratch.clear();
        for &group in &self.touched {
            let g = group as usize;
            self.scratch
                .extend_from_slice(&self.sums[g * self.num_stats..(g + 1) * self.num_stats]);
        }
        (&self.touched, &self.scratch)
    }

    /// Resets the stats of every touched group.
    pub fn clear(&mut self) {
        for &group in &self.touched {
            let g = group as usize;
            self.sums[g * self.num_stats..(g + 1) * self.num_stats].fill(0);
            self.seen[g] = false;
        }
        self.touched.clear();
    }
}
