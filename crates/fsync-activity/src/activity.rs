use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

/// Per-device counter of in-flight block requests, process-wide and guarded
/// by a single mutex (§4.4). `least_busy` picks the candidate with the
/// lowest counter, ties broken by candidate order.
pub struct DeviceActivity<D> {
    counts: Mutex<HashMap<D, u64>>,
}

impl<D> Default for DeviceActivity<D>
where
    D: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<D> DeviceActivity<D>
where
    D: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn using(&self, device: &D) {
        let mut counts = self.counts.lock().unwrap();
        *counts.entry(device.clone()).or_insert(0) += 1;
    }

    pub fn done(&self, device: &D) {
        let mut counts = self.counts.lock().unwrap();
        if let Some(c) = counts.get_mut(device) {
            *c = c.saturating_sub(1);
        }
    }

    pub fn count(&self, device: &D) -> u64 {
        *self.counts.lock().unwrap().get(device).unwrap_or(&0)
    }

    pub fn least_busy<'a>(&self, candidates: &'a [D]) -> Option<&'a D> {
        let counts = self.counts.lock().unwrap();
        let mut best: Option<(&'a D, u64)> = None;
        for c in candidates {
            let n = *counts.get(c).unwrap_or(&0);
            match best {
                Some((_, b)) if n >= b => {}
                _ => best = Some((c, n)),
            }
        }
        best.map(|(d, _)| d)
    }
}
