//! Weighted flow slots of one pool.

use std::collections::BTreeMap;

use serde::Serialize;

/// What a solve did with one active slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotUse {
    /// Demand the slot was assigned to
    pub demand: usize,
    /// Flow carried by the slot
    pub flow: f64,
}

/// Outcome of one slot adaptation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotChange {
    /// The pool carried no flow; back to a single slot
    Collapsed,
    /// The largest slot was split and a new slot opened
    Split,
    /// Two slots serving `demand` were merged towards the larger one
    Merged { demand: usize },
    Unchanged,
}

/// Partition of a pool's outflow into at most `capacity` fractions.
///
/// Fractions of the first `size` slots sum to 1; the remaining slots are 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolSlots {
    fractions: Vec<f64>,
    size: usize,
    /// MIP start demand per slot
    start: Vec<Option<usize>>,
}

impl PoolSlots {
    /// One active slot carrying everything.
    pub fn single(capacity: usize) -> Self {
        let mut fractions = vec![0.0; capacity];
        if let Some(first) = fractions.first_mut() {
            *first = 1.0;
        }
        Self {
            fractions,
            size: 1,
            start: vec![None; capacity],
        }
    }

    /// All slots active with equal fractions.
    pub fn uniform(capacity: usize) -> Self {
        Self {
            fractions: vec![1.0 / capacity as f64; capacity],
            size: capacity,
            start: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.fractions.len()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn fractions(&self) -> &[f64] {
        &self.fractions
    }

    pub fn fraction(&self, j: usize) -> f64 {
        self.fractions[j]
    }

    pub fn start(&self, j: usize) -> Option<usize> {
        self.start[j]
    }

    /// Update the partition from the slot assignments of the last solve.
    ///
    /// `uses[j]` is the assignment of active slot `j`, `None` when the slot
    /// selected no demand.
    pub fn adapt(&mut self, uses: &[Option<SlotUse>], tolerance: f64) -> SlotChange {
        let selected = |j: usize| uses.get(j).copied().flatten();

        for j in 0..self.capacity() {
            self.start[j] = if j < self.size {
                selected(j).map(|u| u.demand)
            } else {
                None
            };
        }

        let outflow: f64 = (0..self.size).filter_map(selected).map(|u| u.flow).sum();
        if outflow <= tolerance {
            self.fractions.iter_mut().for_each(|f| *f = 0.0);
            self.fractions[0] = 1.0;
            self.size = 1;
            return SlotChange::Collapsed;
        }

        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for u in (0..self.size).filter_map(selected) {
            if u.flow > tolerance {
                *counts.entry(u.demand).or_default() += 1;
            }
        }
        let mut busiest: Option<(usize, usize)> = None;
        for (&demand, &count) in &counts {
            if busiest.map_or(true, |(_, best)| count > best) {
                busiest = Some((demand, count));
            }
        }

        let change = match busiest {
            Some((demand, count)) if count >= 2 => {
                self.merge(demand, uses);
                SlotChange::Merged { demand }
            }
            _ if self.size < self.capacity() => {
                self.split(uses);
                SlotChange::Split
            }
            _ => SlotChange::Unchanged,
        };

        self.sort();
        change
    }

    fn split(&mut self, uses: &[Option<SlotUse>]) {
        let mut largest = 0;
        for j in 1..self.size {
            if self.fractions[j] > self.fractions[largest] {
                largest = j;
            }
        }
        let fraction = self.fractions[largest];
        self.fractions[self.size] = fraction / 3.0;
        self.fractions[largest] = 2.0 * fraction / 3.0;
        self.start[self.size] = uses.get(largest).copied().flatten().map(|u| u.demand);
        self.size += 1;
    }

    fn merge(&mut self, demand: usize, uses: &[Option<SlotUse>]) {
        let mut serving: Vec<usize> = (0..self.size)
            .filter(|&j| {
                self.fractions[j] > 0.0
                    && uses.get(j).copied().flatten().map(|u| u.demand) == Some(demand)
            })
            .collect();
        serving.sort_by(|&a, &b| self.fractions[b].total_cmp(&self.fractions[a]));
        if let [a, b, ..] = *serving.as_slice() {
            self.fractions[a] += 2.0 * self.fractions[b] / 3.0;
            self.fractions[b] /= 3.0;
        }
    }

    /// Order slots by decreasing fraction, carrying the MIP start along.
    fn sort(&mut self) {
        let mut order: Vec<usize> = (0..self.capacity()).collect();
        order.sort_by(|&a, &b| self.fractions[b].total_cmp(&self.fractions[a]));
        self.fractions = order.iter().map(|&j| self.fractions[j]).collect();
        self.start = order.iter().map(|&j| self.start[j]).collect();
    }
}
