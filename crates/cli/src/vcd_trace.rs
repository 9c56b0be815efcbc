// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Mutex;
use tm4c_blinky::gpio::Port;
use tm4c_blinky::Irq;
use tm4c_sim_core::SimulationObserver;
use vcd::{IdCode, TimescaleUnit, Value, Writer};

/// Writes pin levels and handler activity as a VCD waveform, one
/// nanosecond per time unit.
pub struct VcdObserver {
    state: Mutex<VcdState>,
    pins: Vec<(Port, u8, IdCode)>,
    handler: IdCode,
    clock_hz: u32,
}

struct VcdState {
    writer: Writer<BufWriter<File>>,
    current_time: u64,
}

impl VcdObserver {
    pub fn new(path: &Path, pins: &[(Port, u8)], clock_hz: u32) -> anyhow::Result<Self> {
        let file = File::create(path)?;
        let mut writer = Writer::new(BufWriter::new(file));

        writer.timescale(1, TimescaleUnit::NS)?;
        writer.add_module("top")?;

        let mut ids = Vec::with_capacity(pins.len());
        let mut current_port = None;
        for &(port, pin) in pins {
            if current_port != Some(port) {
                if current_port.is_some() {
                    writer.upscope()?;
                }
                writer.add_module(&format!("gpio{}", port.name().to_ascii_lowercase()))?;
                current_port = Some(port);
            }
            let id = writer.add_wire(1, &format!("P{}{}", port.name(), pin))?;
            ids.push((port, pin, id));
        }
        if current_port.is_some() {
            writer.upscope()?; // gpio
        }

        let handler = writer.add_wire(1, "in_handler")?;
        writer.upscope()?; // top
        writer.enddefinitions()?;

        writer.timestamp(0)?;
        for &(_, _, id) in &ids {
            writer.change_scalar(id, Value::V0)?;
        }
        writer.change_scalar(handler, Value::V0)?;

        Ok(Self {
            state: Mutex::new(VcdState {
                writer,
                current_time: 0,
            }),
            pins: ids,
            handler,
            clock_hz: clock_hz.max(1),
        })
    }

    fn to_ns(&self, cycle: u64) -> u64 {
        let nanos = cycle as u128 * 1_000_000_000 / self.clock_hz as u128;
        u64::try_from(nanos).unwrap_or(u64::MAX)
    }

    fn change(&self, cycle: u64, id: IdCode, level: bool) {
        let time = self.to_ns(cycle);
        if let Ok(mut state) = self.state.lock() {
            if time > state.current_time {
                state.current_time = time;
                let _ = state.writer.timestamp(time);
            }
            let value = if level { Value::V1 } else { Value::V0 };
            let _ = state.writer.change_scalar(id, value);
        }
    }
}

impl std::fmt::Debug for VcdObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VcdObserver({} pins)", self.pins.len())
    }
}

impl SimulationObserver for VcdObserver {
    fn on_pin_change(&self, cycle: u64, port: Port, pin: u8, level: bool) {
        if let Some(&(_, _, id)) = self.pins.iter().find(|(p, n, _)| *p == port && *n == pin) {
            self.change(cycle, id, level);
        }
    }

    fn on_interrupt_entry(&self, cycle: u64, _irq: Irq) {
        self.change(cycle, self.handler, true);
    }

    fn on_interrupt_exit(&self, cycle: u64, _irq: Irq) {
        // Handlers take no simulated time; hold the marker for one clock.
        self.change(cycle.saturating_add(1), self.handler, false);
    }

    fn on_simulation_stop(&self, cycle: u64) {
        let time = self.to_ns(cycle);
        if let Ok(mut state) = self.state.lock() {
            if time > state.current_time {
                state.current_time = time;
                let _ = state.writer.timestamp(time);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_marker_has_visible_width() {
        let path = std::env::temp_dir().join(format!("tm4c-sim-marker-{}.vcd", std::process::id()));
        {
            let vcd = VcdObserver::new(&path, &[(Port::F, 2)], 40_000_000).unwrap();
            vcd.on_interrupt_entry(100, Irq::TIMER0A);
            vcd.on_pin_change(100, Port::F, 2, true);
            vcd.on_interrupt_exit(100, Irq::TIMER0A);
            vcd.on_simulation_stop(1_000);
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        // 100 cycles at 40 MHz is 2500 ns; one clock later is 2525 ns.
        let rise = text.find("#2500\n").unwrap();
        let fall = text.find("#2525\n").unwrap();
        assert!(rise < fall);
        // Marker and PF2 both rise at entry.
        let raised: Vec<&str> = text[rise..fall].lines().skip(1).collect();
        assert_eq!(raised.len(), 2);
        assert!(raised.iter().all(|line| line.starts_with('1')));
        assert!(text[fall..].lines().nth(1).unwrap().starts_with('0'));
        assert!(text.contains("#25000"));
    }
}
