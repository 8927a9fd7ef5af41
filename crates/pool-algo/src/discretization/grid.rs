//! Uniform breakpoint window over `[0, ub]`.

use serde::Serialize;

/// `size` equally spaced breakpoints `min + j·step` covering a window of
/// length `length` inside `[0, upper]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalGrid {
    min: f64,
    length: f64,
    step: f64,
    size: usize,
    upper: f64,
    /// Breakpoint suggested as MIP start after the last refinement
    start: Option<usize>,
}

impl IntervalGrid {
    /// Window spanning the whole range. `size` must be at least 2.
    pub fn new(size: usize, upper: f64) -> Self {
        let last = size.saturating_sub(1).max(1);
        Self {
            min: 0.0,
            length: upper,
            step: upper / last as f64,
            size,
            upper,
            start: None,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn start(&self) -> Option<usize> {
        self.start
    }

    pub fn breakpoint(&self, j: usize) -> f64 {
        self.min + self.step * j as f64
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.size).map(move |j| self.breakpoint(j))
    }

    /// Re-center the window around the selected breakpoint `selected`.
    ///
    /// Interior selections and selections sitting on a true bound of the
    /// range halve the window; a selection on a window edge that is not a
    /// range bound keeps the step and shifts the window towards it.
    pub fn refine(&mut self, selected: usize, tolerance: f64) {
        let last = self.size - 1;
        let value = self.breakpoint(selected);
        let center = (self.size + 1) / 2 - 1;

        let idx = if selected == 0 {
            if value <= tolerance {
                self.halve();
                self.min = 0.0;
                self.start = Some(0);
                return;
            }
            self.shift_down(value, center)
        } else if selected == last {
            if value + tolerance >= self.upper {
                self.halve();
                last
            } else {
                self.shift_up(value, center)
            }
        } else {
            self.halve();
            let idx = self.shift_down(value, center);
            self.shift_up(value, idx)
        };

        self.min = self.anchor(value, idx);
        self.start = Some(idx);
    }

    fn halve(&mut self) {
        self.length /= 2.0;
        self.step = self.length / (self.size - 1) as f64;
    }

    fn anchor(&self, value: f64, idx: usize) -> f64 {
        if idx == 0 {
            value
        } else {
            value - self.step * idx as f64
        }
    }

    /// Lower the anchor index until the window starts at or above 0.
    fn shift_down(&self, value: f64, mut idx: usize) -> usize {
        while self.anchor(value, idx) < 0.0 && idx > 0 {
            idx -= 1;
        }
        idx
    }

    /// Raise the anchor index until the window ends at or below the bound.
    fn shift_up(&self, value: f64, mut idx: usize) -> usize {
        while self.anchor(value, idx) + self.length > self.upper && idx < self.size - 1 {
            idx += 1;
        }
        idx
    }
}
