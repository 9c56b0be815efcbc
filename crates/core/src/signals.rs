// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimulationObserver;
use serde::Serialize;
use std::sync::Mutex;
use tm4c_blinky::gpio::Port;

/// Represents a digital signal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DigitalLevel {
    #[default]
    Low,
    High,
}

impl From<bool> for DigitalLevel {
    fn from(b: bool) -> Self {
        if b {
            DigitalLevel::High
        } else {
            DigitalLevel::Low
        }
    }
}

impl From<DigitalLevel> for bool {
    fn from(level: DigitalLevel) -> Self {
        matches!(level, DigitalLevel::High)
    }
}

/// A single pin changing level, as seen on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinChange {
    pub port: Port,
    pub pin: u8,
    pub level: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinEvent {
    pub cycle: u64,
    pub port: Port,
    pub pin: u8,
    pub level: DigitalLevel,
}

/// Shape of one pin's waveform over complete cycles.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WaveformStats {
    pub rising_edges: u64,
    pub falling_edges: u64,
    /// Mean rising-to-rising distance.
    pub period_cycles: Option<f64>,
    /// Mean rising-to-falling distance.
    pub high_cycles: Option<f64>,
    pub frequency_hz: Option<f64>,
    pub duty_percent: Option<f64>,
}

/// Records pin transitions for later waveform analysis.
#[derive(Debug, Default)]
pub struct PinTrace {
    events: Mutex<Vec<PinEvent>>,
}

impl PinTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PinEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn events_for(&self, port: Port, pin: u8) -> Vec<PinEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.port == port && e.pin == pin)
            .collect()
    }

    /// Pins that changed at least once, in first-seen order.
    pub fn active_pins(&self) -> Vec<(Port, u8)> {
        let mut pins = Vec::new();
        for e in self.events() {
            if !pins.contains(&(e.port, e.pin)) {
                pins.push((e.port, e.pin));
            }
        }
        pins
    }

    pub fn stats(&self, port: Port, pin: u8, clock_hz: u32) -> WaveformStats {
        waveform_stats(&self.events_for(port, pin), clock_hz)
    }
}

impl SimulationObserver for PinTrace {
    fn on_pin_change(&self, cycle: u64, port: Port, pin: u8, level: bool) {
        if let Ok(mut events) = self.events.lock() {
            events.push(PinEvent {
                cycle,
                port,
                pin,
                level: level.into(),
            });
        }
    }
}

/// Period and duty over the complete rising-to-rising cycles in `events`,
/// which must all belong to one pin.
pub fn waveform_stats(events: &[PinEvent], clock_hz: u32) -> WaveformStats {
    let mut stats = WaveformStats::default();
    let rising: Vec<u64> = events
        .iter()
        .filter(|e| e.level == DigitalLevel::High)
        .map(|e| e.cycle)
        .collect();
    stats.rising_edges = rising.len() as u64;
    stats.falling_edges = events.len() as u64 - stats.rising_edges;

    if rising.len() < 2 {
        return stats;
    }

    let mut period_total = 0u64;
    let mut high_total = 0u64;
    let mut complete = 0u64;
    for pair in rising.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let fall = events
            .iter()
            .find(|e| e.level == DigitalLevel::Low && e.cycle > start && e.cycle <= end);
        if let Some(fall) = fall {
            period_total += end - start;
            high_total += fall.cycle - start;
            complete += 1;
        }
    }
    if complete == 0 {
        return stats;
    }

    let period = period_total as f64 / complete as f64;
    let high = high_total as f64 / complete as f64;
    stats.period_cycles = Some(period);
    stats.high_cycles = Some(high);
    stats.duty_percent = Some(high / period * 100.0);
    if clock_hz > 0 {
        stats.frequency_hz = Some(clock_hz as f64 / period);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digital_level_conversions() {
        assert_eq!(DigitalLevel::from(true), DigitalLevel::High);
        let b: bool = DigitalLevel::Low.into();
        assert!(!b);
    }

    #[test]
    fn test_square_wave_stats() {
        let trace = PinTrace::new();
        for k in 0..6u64 {
            trace.on_pin_change(k * 50, Port::F, 2, k % 2 == 0);
        }
        // Unrelated pin must not leak in.
        trace.on_pin_change(10, Port::F, 1, true);

        let stats = trace.stats(Port::F, 2, 1000);
        assert_eq!(stats.rising_edges, 3);
        assert_eq!(stats.falling_edges, 3);
        assert_eq!(stats.period_cycles, Some(100.0));
        assert_eq!(stats.high_cycles, Some(50.0));
        assert_eq!(stats.duty_percent, Some(50.0));
        assert_eq!(stats.frequency_hz, Some(10.0));
        assert_eq!(trace.active_pins(), vec![(Port::F, 2), (Port::F, 1)]);
    }

    #[test]
    fn test_single_pulse_has_no_period() {
        let trace = PinTrace::new();
        trace.on_pin_change(5, Port::F, 2, true);
        trace.on_pin_change(9, Port::F, 2, false);
        let stats = trace.stats(Port::F, 2, 1000);
        assert_eq!(stats.rising_edges, 1);
        assert_eq!(stats.period_cycles, None);
        assert_eq!(stats.frequency_hz, None);
    }
}
