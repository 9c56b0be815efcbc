// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::SystemBus;
use crate::{CoreState, SimResult, SimulationError, SimulationObserver};
use std::cell::RefCell;
use std::sync::Arc;
use tm4c_blinky::Hardware;

/// Firmware-facing view of the simulated chip for one stretch of code.
///
/// The first bus fault is latched and every access after it is dropped,
/// the way a core stops making progress once it faults. Reads after a
/// fault return zero.
pub struct SimHardware<'a> {
    bus: &'a mut SystemBus,
    core: &'a mut CoreState,
    observers: &'a [Arc<dyn SimulationObserver>],
    cycle: u64,
    fault: RefCell<Option<SimulationError>>,
}

impl<'a> SimHardware<'a> {
    pub fn new(
        bus: &'a mut SystemBus,
        core: &'a mut CoreState,
        observers: &'a [Arc<dyn SimulationObserver>],
        cycle: u64,
    ) -> Self {
        Self {
            bus,
            core,
            observers,
            cycle,
            fault: RefCell::new(None),
        }
    }

    pub fn faulted(&self) -> bool {
        self.fault.borrow().is_some()
    }

    fn latch(&self, err: SimulationError) {
        let mut fault = self.fault.borrow_mut();
        if fault.is_none() {
            tracing::warn!("Firmware fault at cycle {}: {}", self.cycle, err);
            *fault = Some(err);
        }
    }

    fn publish_pin_changes(&mut self) {
        for change in self.bus.take_pin_changes() {
            tracing::debug!(
                "P{}{} -> {}",
                change.port.name(),
                change.pin,
                u8::from(change.level)
            );
            for observer in self.observers {
                observer.on_pin_change(self.cycle, change.port, change.pin, change.level);
            }
        }
    }

    /// End of the firmware stretch: the latched fault, if any.
    pub fn finish(self) -> SimResult<()> {
        match self.fault.into_inner() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Hardware for SimHardware<'_> {
    fn read(&self, addr: u32) -> u32 {
        if self.faulted() {
            return 0;
        }
        match self.bus.read_u32(addr) {
            Ok(value) => value,
            Err(err) => {
                self.latch(err);
                0
            }
        }
    }

    fn write(&mut self, addr: u32, value: u32) {
        if self.faulted() {
            return;
        }
        if let Err(err) = self.bus.write_u32(addr, value) {
            self.latch(err);
            return;
        }
        tracing::trace!("write {:#010x} <- {:#010x}", addr, value);
        for observer in self.observers {
            observer.on_register_write(self.cycle, addr, value);
        }
        self.publish_pin_changes();
    }

    fn enable_interrupts(&mut self) {
        if self.faulted() {
            return;
        }
        self.core.primask = false;
        for observer in self.observers {
            observer.on_master_enable(self.cycle, true);
        }
    }

    fn disable_interrupts(&mut self) {
        if self.faulted() {
            return;
        }
        self.core.primask = true;
        for observer in self.observers {
            observer.on_master_enable(self.cycle, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm4c_blinky::regs::*;

    #[test]
    fn test_fault_is_latched_and_stops_access() {
        let mut bus = SystemBus::new();
        let mut core = CoreState::default();
        let mut hw = SimHardware::new(&mut bus, &mut core, &[], 0);

        // GPIOF is not clocked yet.
        hw.write(GPIO_PORTF_BASE + GPIO_DIR, 0x0E);
        hw.write(SYSCTL_RCGCGPIO, 1 << 5);
        assert_eq!(hw.read(SYSCTL_RCC), 0);

        let err = hw.finish().unwrap_err();
        assert!(matches!(err, SimulationError::PeripheralNotClocked { .. }));
        // The gate write after the fault never landed.
        assert_eq!(bus.read_u32(SYSCTL_RCGCGPIO).unwrap(), 0);
    }

    #[test]
    fn test_master_enable_toggles_primask() {
        let mut bus = SystemBus::new();
        let mut core = CoreState::default();
        {
            let mut hw = SimHardware::new(&mut bus, &mut core, &[], 0);
            hw.disable_interrupts();
            hw.finish().unwrap();
        }
        assert!(core.primask);
    }
}
