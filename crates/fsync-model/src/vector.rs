use serde::{Deserialize, Serialize};

/// A 32-bit truncation of a device's cryptographic id, used as the key in a
/// [`Vector`].
pub type ShortId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Counter {
    id: ShortId,
    value: u64,
}

/// Version vector: an ordered list of `(short_device_id, counter)` pairs.
///
/// Entries are kept sorted by id so that two vectors built from the same set
/// of updates compare equal regardless of update order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vector {
    counters: Vec<Counter>,
}

impl Vector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumps `id`'s counter by one and returns the new value.
    pub fn update(&mut self, id: ShortId) -> u64 {
        match self.counters.binary_search_by_key(&id, |c| c.id) {
            Ok(idx) => {
                self.counters[idx].value += 1;
                self.counters[idx].value
            }
            Err(idx) => {
                self.counters.insert(idx, Counter { id, value: 1 });
                1
            }
        }
    }

    pub fn counter(&self, id: ShortId) -> u64 {
        self.counters
            .binary_search_by_key(&id, |c| c.id)
            .map(|idx| self.counters[idx].value)
            .unwrap_or(0)
    }

    /// Pairwise max of both vectors.
    pub fn merge(&self, other: &Vector) -> Vector {
        let mut out = self.clone();
        for c in &other.counters {
            match out.counters.binary_search_by_key(&c.id, |e| e.id) {
                Ok(idx) => out.counters[idx].value = out.counters[idx].value.max(c.value),
                Err(idx) => out.counters.insert(idx, *c),
            }
        }
        out
    }

    /// True iff `self >= other` for every id (self dominates or equals).
    pub fn greater_equal(&self, other: &Vector) -> bool {
        other.counters.iter().all(|c| self.counter(c.id) >= c.value)
    }

    /// True iff neither vector dominates the other.
    pub fn concurrent(&self, other: &Vector) -> bool {
        !self.greater_equal(other) && !other.greater_equal(self)
    }

    /// Strictly older: dominated by `other` and not equal.
    pub fn less_than(&self, other: &Vector) -> bool {
        other.greater_equal(self) && self != other
    }

    /// Drops all counters except `id`'s, leaving the vector solely
    /// attributable to `id`.
    pub fn drop_others(&self, id: ShortId) -> Vector {
        let value = self.counter(id);
        let mut out = Vector::new();
        if value > 0 {
            out.counters.push(Counter { id, value });
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}
