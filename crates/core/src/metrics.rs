// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimulationObserver;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tm4c_blinky::Irq;

const NEVER: u64 = u64::MAX;

#[derive(Debug)]
pub struct InterruptMetrics {
    dispatches: Mutex<BTreeMap<u16, u64>>,
    first_dispatch_cycle: AtomicU64,
    master_enable_cycle: AtomicU64,
    masked: AtomicBool,
    dispatches_while_masked: AtomicU64,
    register_writes: AtomicU64,
}

/// Point-in-time copy of [`InterruptMetrics`] for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterruptSummary {
    pub dispatches: BTreeMap<u16, u64>,
    pub first_dispatch_cycle: Option<u64>,
    pub master_enable_cycle: Option<u64>,
    pub dispatches_while_masked: u64,
    pub register_writes: u64,
}

impl Default for InterruptMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptMetrics {
    pub fn new() -> Self {
        Self {
            dispatches: Mutex::new(BTreeMap::new()),
            first_dispatch_cycle: AtomicU64::new(NEVER),
            master_enable_cycle: AtomicU64::new(NEVER),
            // The firmware has not unmasked anything yet.
            masked: AtomicBool::new(true),
            dispatches_while_masked: AtomicU64::new(0),
            register_writes: AtomicU64::new(0),
        }
    }

    pub fn dispatch_count(&self, irq: Irq) -> u64 {
        self.dispatches
            .lock()
            .ok()
            .and_then(|m| m.get(&irq.number()).copied())
            .unwrap_or(0)
    }

    pub fn total_dispatches(&self) -> u64 {
        self.dispatches
            .lock()
            .map(|m| m.values().sum())
            .unwrap_or(0)
    }

    pub fn first_dispatch_cycle(&self) -> Option<u64> {
        load_cycle(&self.first_dispatch_cycle)
    }

    /// Cycle of the first master enable.
    pub fn master_enable_cycle(&self) -> Option<u64> {
        load_cycle(&self.master_enable_cycle)
    }

    /// Handler entries seen before the firmware's first master enable or
    /// while it had interrupts masked again.
    pub fn dispatches_while_masked(&self) -> u64 {
        self.dispatches_while_masked.load(Ordering::SeqCst)
    }

    pub fn register_writes(&self) -> u64 {
        self.register_writes.load(Ordering::SeqCst)
    }

    pub fn summary(&self) -> InterruptSummary {
        InterruptSummary {
            dispatches: self.dispatches.lock().map(|m| m.clone()).unwrap_or_default(),
            first_dispatch_cycle: self.first_dispatch_cycle(),
            master_enable_cycle: self.master_enable_cycle(),
            dispatches_while_masked: self.dispatches_while_masked(),
            register_writes: self.register_writes(),
        }
    }
}

fn load_cycle(cell: &AtomicU64) -> Option<u64> {
    match cell.load(Ordering::SeqCst) {
        NEVER => None,
        cycle => Some(cycle),
    }
}

impl SimulationObserver for InterruptMetrics {
    fn on_register_write(&self, _cycle: u64, _addr: u32, _value: u32) {
        self.register_writes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_master_enable(&self, cycle: u64, enabled: bool) {
        self.masked.store(!enabled, Ordering::SeqCst);
        if enabled {
            let _ = self.master_enable_cycle.compare_exchange(
                NEVER,
                cycle,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
    }

    fn on_interrupt_entry(&self, cycle: u64, irq: Irq) {
        if self.masked.load(Ordering::SeqCst) {
            self.dispatches_while_masked.fetch_add(1, Ordering::SeqCst);
        }
        let _ = self.first_dispatch_cycle.compare_exchange(
            NEVER,
            cycle,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if let Ok(mut m) = self.dispatches.lock() {
            *m.entry(irq.number()).or_insert(0) += 1;
        }
    }
}
