// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MachineSnapshot {
    pub cycles: u64,
    pub clock_hz: u32,
    pub primask: bool,
    /// IRQ numbers with a registered handler.
    pub handlers: Vec<u16>,
    pub peripherals: BTreeMap<String, serde_json::Value>,
}

impl MachineSnapshot {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Field of one peripheral's dump, e.g. `("timer0", "tailr")`.
    pub fn field(&self, peripheral: &str, field: &str) -> Option<&serde_json::Value> {
        self.peripherals.get(peripheral)?.get(field)
    }
}
