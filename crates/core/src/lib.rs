// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod hardware;
pub mod metrics;
pub mod peripherals;
pub mod signals;
pub mod snapshot;
pub mod system;
pub mod vectors;

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tm4c_blinky::gpio::Port;
use tm4c_blinky::{Blinky, InitReport, Irq};


/// Back-to-back dispatches of one IRQ, with no simulated time passing,
/// before the machine gives up on the handler.
pub const DEFAULT_STORM_LIMIT: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u32),
    #[error("Unaligned word access at {0:#x}")]
    UnalignedAccess(u32),
    #[error("Access to {peripheral} at {addr:#x} while its clock gate is off")]
    PeripheralNotClocked { peripheral: String, addr: u32 },
    #[error("Bus fault in {context}: {source}")]
    BusFault {
        context: String,
        #[source]
        source: Box<SimulationError>,
    },
    #[error("No handler registered for pending {0}")]
    UnhandledInterrupt(Irq),
    #[error("Interrupt storm on {irq}: {dispatches} dispatches without the source clearing")]
    InterruptStorm { irq: Irq, dispatches: u32 },
}

impl SimulationError {
    /// The access fault underneath any firmware-context wrapping.
    pub fn root(&self) -> &SimulationError {
        match self {
            SimulationError::BusFault { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type SimResult<T> = Result<T, SimulationError>;

#[derive(Debug, Clone, Default)]
pub struct PeripheralTickResult {
    /// Level of the peripheral's interrupt line after the tick.
    pub irq: bool,
    pub cycles: u32,
}

/// Trait for observing simulation events in a modular way.
///
/// Every callback carries the machine cycle it happened on.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_simulation_start(&self) {}
    fn on_simulation_stop(&self, _cycle: u64) {}
    fn on_register_write(&self, _cycle: u64, _addr: u32, _value: u32) {}
    fn on_master_enable(&self, _cycle: u64, _enabled: bool) {}
    fn on_interrupt_entry(&self, _cycle: u64, _irq: Irq) {}
    fn on_interrupt_exit(&self, _cycle: u64, _irq: Irq) {}
    fn on_pin_change(&self, _cycle: u64, _port: Port, _pin: u8, _level: bool) {}
}

/// Trait representing a memory-mapped peripheral
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&self, offset: u32) -> SimResult<u8>;
    fn write(&mut self, offset: u32, value: u8) -> SimResult<()>;

    fn read_word(&self, offset: u32) -> SimResult<u32> {
        let mut value = 0;
        for i in 0..4 {
            value |= (self.read(offset + i)? as u32) << (i * 8);
        }
        Ok(value)
    }

    fn write_word(&mut self, offset: u32, value: u32) -> SimResult<()> {
        for i in 0..4 {
            self.write(offset + i, (value >> (i * 8)) as u8)?;
        }
        Ok(())
    }

    /// Advance one clock.
    fn tick(&mut self) -> PeripheralTickResult {
        PeripheralTickResult::default()
    }

    /// Clocks until the next internal state change worth stopping for, or
    /// `None` if the peripheral is idle.
    fn cycles_until_event(&self) -> Option<u64> {
        None
    }

    /// Advance many clocks at once. Never crosses more than one event when
    /// `cycles <= cycles_until_event()`.
    fn advance(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.tick();
        }
    }

    /// Current level of the interrupt line.
    fn irq_line(&self) -> bool {
        false
    }

    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Processor state the firmware can change without touching the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreState {
    /// Set when interrupts are masked.
    pub primask: bool,
    /// Innermost handler being executed.
    pub active: Option<Irq>,
}

impl Default for CoreState {
    fn default() -> Self {
        // PRIMASK resets to 0 on Cortex-M4.
        Self {
            primask: false,
            active: None,
        }
    }
}

pub struct Machine {
    pub bus: bus::SystemBus,
    pub core: CoreState,
    pub vectors: vectors::VectorTable,
    pub observers: Vec<Arc<dyn SimulationObserver>>,
    pub total_cycles: u64,
    pub storm_limit: u32,
}

impl Machine {
    pub fn new(bus: bus::SystemBus) -> Self {
        Self {
            bus,
            core: CoreState::default(),
            vectors: vectors::VectorTable::new(),
            observers: Vec::new(),
            total_cycles: 0,
            storm_limit: DEFAULT_STORM_LIMIT,
        }
    }

    pub fn add_observer(&mut self, observer: Arc<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    /// Run `f` as firmware code at the current cycle. Bus faults it causes
    /// are reported once `f` returns, wrapped with `context`.
    pub fn execute<R>(
        &mut self,
        context: &str,
        f: impl FnOnce(&mut hardware::SimHardware<'_>) -> R,
    ) -> SimResult<R> {
        let mut hw = hardware::SimHardware::new(
            &mut self.bus,
            &mut self.core,
            &self.observers,
            self.total_cycles,
        );
        let out = f(&mut hw);
        match hw.finish() {
            Ok(()) => Ok(out),
            Err(fault) => Err(SimulationError::BusFault {
                context: context.to_string(),
                source: Box::new(fault),
            }),
        }
    }

    /// Register the blinker's timer handler and run its initializer.
    pub fn boot(&mut self, blinky: Blinky) -> SimResult<InitReport> {
        for observer in &self.observers {
            observer.on_simulation_start();
        }
        self.vectors.register(Box::new(blinky));

        let report = self.execute("initializer", |hw| blinky.init(hw))?;
        tracing::info!(
            "Boot complete: clock {} Hz, reload {}",
            report.clock_hz,
            report.reload
        );

        // Lines asserted before the master enable are taken now.
        self.bus.sample_irq_lines();
        self.dispatch_pending()?;
        Ok(report)
    }

    /// Let `cycles` clocks elapse, taking interrupts as they arrive.
    pub fn run_cycles(&mut self, cycles: u64) -> SimResult<()> {
        let target = self.total_cycles.saturating_add(cycles);
        self.dispatch_pending()?;

        while self.total_cycles < target {
            let remaining = target - self.total_cycles;
            let step = self
                .bus
                .cycles_until_event()
                .map_or(remaining, |n| n.min(remaining))
                .max(1);

            self.bus.advance(step);
            self.total_cycles += step;

            self.bus.sample_irq_lines();
            self.dispatch_pending()?;
        }

        Ok(())
    }

    pub fn run_for(&mut self, duration: Duration) -> SimResult<()> {
        self.run_cycles(self.duration_to_cycles(duration))
    }

    /// System clock as currently programmed in RCC.
    pub fn clock_hz(&self) -> u32 {
        self.bus.sysctl().map(|s| s.clock_hz()).unwrap_or(0)
    }

    /// Cycles in `duration` at the programmed clock, saturating at `u64::MAX`.
    pub fn duration_to_cycles(&self, duration: Duration) -> u64 {
        let cycles = self.clock_hz() as u128 * duration.as_nanos() / 1_000_000_000;
        u64::try_from(cycles).unwrap_or(u64::MAX)
    }

    pub fn elapsed(&self) -> Duration {
        let hz = self.clock_hz();
        if hz == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_cycles as u128 * 1_000_000_000 / hz as u128;
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Take every pending, enabled interrupt while PRIMASK allows it.
    pub fn dispatch_pending(&mut self) -> SimResult<()> {
        let mut last: Option<Irq> = None;
        let mut repeats = 0u32;

        while !self.core.primask {
            let Some(irq) = self.bus.nvic.highest_pending_enabled() else {
                break;
            };

            if last == Some(irq) {
                repeats += 1;
                if repeats >= self.storm_limit {
                    tracing::warn!("{} re-pended {} times at cycle {}", irq, repeats, self.total_cycles);
                    return Err(SimulationError::InterruptStorm {
                        irq,
                        dispatches: repeats,
                    });
                }
            } else {
                last = Some(irq);
                repeats = 0;
            }

            self.dispatch(irq)?;
        }

        Ok(())
    }

    fn dispatch(&mut self, irq: Irq) -> SimResult<()> {
        let Some(mut handler) = self.vectors.take(irq) else {
            return Err(SimulationError::UnhandledInterrupt(irq));
        };

        tracing::debug!("Dispatch {} at cycle {}", irq, self.total_cycles);
        self.bus.nvic.clear_pending(irq);
        self.bus.nvic.set_active(irq, true);
        let preempted = self.core.active.replace(irq);
        for observer in &self.observers {
            observer.on_interrupt_entry(self.total_cycles, irq);
        }

        let context = format!("{} handler", irq);
        let result = self.execute(&context, |hw| handler.on_interrupt(hw));

        self.vectors.restore(handler);
        self.core.active = preempted;
        self.bus.nvic.set_active(irq, false);
        for observer in &self.observers {
            observer.on_interrupt_exit(self.total_cycles, irq);
        }

        // Level-sensitive: a source the handler left asserted pends again.
        self.bus.sample_irq_lines();
        result
    }

    /// Notify observers that the run is over.
    pub fn stop(&self) {
        for observer in &self.observers {
            observer.on_simulation_stop(self.total_cycles);
        }
    }

    pub fn snapshot(&self) -> snapshot::MachineSnapshot {
        snapshot::MachineSnapshot {
            cycles: self.total_cycles,
            clock_hz: self.clock_hz(),
            primask: self.core.primask,
            handlers: self.vectors.irqs().map(|irq| irq.number()).collect(),
            peripherals: self
                .bus
                .peripherals
                .iter()
                .map(|p| (p.name.clone(), p.dev.snapshot()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    pub fn peek_peripheral(&self, name: &str) -> Option<serde_json::Value> {
        self.bus
            .peripherals
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.dev.snapshot())
    }
}
