//! Per-(owner, period) critical section.
//!
//! Only one cycle per key runs at a time. A request that arrives while a
//! cycle is in flight marks the key dirty and returns; the running cycle
//! then goes around once more before releasing the key. Because every cycle
//! is a full recompute from a fresh snapshot, one extra run covers any
//! number of coalesced requests, and an older cycle can never land after a
//! newer one for the same key.

use std::collections::HashMap;

use parking_lot::Mutex;
use splitgrid_core::{OwnerId, Period};

pub type CycleKey = (OwnerId, Period);

#[derive(Debug, Default)]
pub struct CycleGate {
    /// In-flight keys → "another request arrived meanwhile".
    in_flight: Mutex<HashMap<CycleKey, bool>>,
}

pub enum Admission<'g> {
    /// Caller owns the key until the guard is released or dropped.
    Run(CycleGuard<'g>),
    /// Folded into the in-flight cycle.
    Coalesced,
}

impl CycleGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self, key: CycleKey) -> Admission<'_> {
        let mut map = self.in_flight.lock();
        match map.get_mut(&key) {
            Some(dirty) => {
                *dirty = true;
                Admission::Coalesced
            }
            None => {
                map.insert(key.clone(), false);
                Admission::Run(CycleGuard { gate: self, key, released: false })
            }
        }
    }

    #[cfg(test)]
    pub fn is_in_flight(&self, key: &CycleKey) -> bool {
        self.in_flight.lock().contains_key(key)
    }
}

pub struct CycleGuard<'g> {
    gate: &'g CycleGate,
    key: CycleKey,
    released: bool,
}

impl CycleGuard<'_> {
    /// Called after each run. Returns true (and clears the flag) if more
    /// requests arrived, meaning the caller must run again. Otherwise the
    /// key is released and false is returned.
    pub fn rerun_requested(&mut self) -> bool {
        let mut map = self.gate.in_flight.lock();
        match map.get_mut(&self.key) {
            Some(dirty) if *dirty => {
                *dirty = false;
                true
            }
            _ => {
                map.remove(&self.key);
                self.released = true;
                false
            }
        }
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.gate.in_flight.lock().remove(&self.key);
        }
    }
}
