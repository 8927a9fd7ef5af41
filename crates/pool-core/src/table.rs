//! Dense row-major tables indexed by unit positions.
//!
//! Pipe data, flow snapshots and per-entity discretization state are all
//! addressed by small integer tuples, so a flat `Vec` with explicit shape is
//! enough and keeps iteration order deterministic.

use serde::{Deserialize, Serialize};

/// Two-dimensional table (`rows x cols`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Clone> Table<T> {
    /// Create a table with every cell set to `fill`.
    pub fn filled(rows: usize, cols: usize, fill: T) -> Self {
        Self {
            rows,
            cols,
            data: vec![fill; rows * cols],
        }
    }
}

impl<T> Table<T> {
    /// Build a table cell by cell.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { rows, cols, data }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    fn offset(&self, r: usize, c: usize) -> usize {
        debug_assert!(r < self.rows && c < self.cols, "table index out of range");
        r * self.cols + c
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> &T {
        &self.data[self.offset(r, c)]
    }

    #[inline]
    pub fn get_mut(&mut self, r: usize, c: usize) -> &mut T {
        let idx = self.offset(r, c);
        &mut self.data[idx]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, value: T) {
        let idx = self.offset(r, c);
        self.data[idx] = value;
    }

    /// Cells of one row, in column order.
    pub fn row(&self, r: usize) -> &[T] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    /// All cells with their `(row, col)` position.
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &T)> {
        let cols = self.cols.max(1);
        self.data
            .iter()
            .enumerate()
            .map(move |(i, v)| ((i / cols, i % cols), v))
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> Table<U> {
        Table {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(&mut f).collect(),
        }
    }
}

impl<T: Copy> Table<T> {
    #[inline]
    pub fn at(&self, r: usize, c: usize) -> T {
        *self.get(r, c)
    }
}

/// Three-dimensional table (`d0 x d1 x d2`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cube<T> {
    dims: (usize, usize, usize),
    data: Vec<T>,
}

impl<T: Clone> Cube<T> {
    pub fn filled(d0: usize, d1: usize, d2: usize, fill: T) -> Self {
        Self {
            dims: (d0, d1, d2),
            data: vec![fill; d0 * d1 * d2],
        }
    }
}

impl<T> Cube<T> {
    pub fn from_fn(
        d0: usize,
        d1: usize,
        d2: usize,
        mut f: impl FnMut(usize, usize, usize) -> T,
    ) -> Self {
        let mut data = Vec::with_capacity(d0 * d1 * d2);
        for a in 0..d0 {
            for b in 0..d1 {
                for c in 0..d2 {
                    data.push(f(a, b, c));
                }
            }
        }
        Self {
            dims: (d0, d1, d2),
            data,
        }
    }

    #[inline]
    pub fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    #[inline]
    fn offset(&self, a: usize, b: usize, c: usize) -> usize {
        let (d0, d1, d2) = self.dims;
        debug_assert!(a < d0 && b < d1 && c < d2, "cube index out of range");
        (a * d1 + b) * d2 + c
    }

    #[inline]
    pub fn get(&self, a: usize, b: usize, c: usize) -> &T {
        &self.data[self.offset(a, b, c)]
    }

    #[inline]
    pub fn set(&mut self, a: usize, b: usize, c: usize, value: T) {
        let idx = self.offset(a, b, c);
        self.data[idx] = value;
    }
}

impl<T: Copy> Cube<T> {
    #[inline]
    pub fn at(&self, a: usize, b: usize, c: usize) -> T {
        *self.get(a, b, c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_row_major() {
        let t = Table::from_fn(2, 3, |r, c| r * 10 + c);
        assert_eq!(t.row(1), &[10, 11, 12]);
        assert_eq!(t.at(0, 2), 2);
        let positions: Vec<_> = t.iter().map(|(pos, _)| pos).collect();
        assert_eq!(positions[4], (1, 1));
    }

    #[test]
    fn cube_set_and_get() {
        let mut cube = Cube::filled(2, 2, 3, 0.0);
        cube.set(1, 0, 2, 4.5);
        assert_eq!(cube.at(1, 0, 2), 4.5);
        assert_eq!(cube.at(0, 1, 2), 0.0);
        assert_eq!(cube.dims(), (2, 2, 3));
    }
}
