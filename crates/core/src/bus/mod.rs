// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::peripherals::gpio::GpioPort;
use crate::peripherals::nvic::{Nvic, NvicState, NVIC_BASE, NVIC_SIZE};
use crate::peripherals::sysctl::SysCtl;
use crate::peripherals::timer::GpTimer;
use crate::signals::PinChange;
use crate::{Peripheral, SimResult, SimulationError};
use std::sync::Arc;
use tm4c_blinky::gpio::Port;
use tm4c_blinky::regs::SYSCTL_BASE;
use tm4c_blinky::sysctl::ClockGate;
use tm4c_blinky::timer::TimerBlock;
use tm4c_blinky::Irq;

const BLOCK_SIZE: u32 = 0x1000;

pub struct PeripheralEntry {
    pub name: String,
    pub base: u32,
    pub size: u32,
    pub irq: Option<Irq>,
    /// Run-mode gate that must be open before the block answers.
    pub gate: Option<ClockGate>,
    pub dev: Box<dyn Peripheral>,
}

impl PeripheralEntry {
    fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr - self.base < self.size
    }
}

pub struct SystemBus {
    pub peripherals: Vec<PeripheralEntry>,
    pub nvic: Arc<NvicState>,
    pin_changes: Vec<PinChange>,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    /// TM4C123GH6PM map: System Control, GPIO A-F, Timer0-5 and the NVIC.
    pub fn new() -> Self {
        let mut bus = Self::empty();

        bus.add_peripheral(PeripheralEntry {
            name: "sysctl".to_string(),
            base: SYSCTL_BASE,
            size: BLOCK_SIZE,
            irq: None,
            gate: None,
            dev: Box::new(SysCtl::new()),
        });

        for port in Port::ALL {
            bus.add_peripheral(PeripheralEntry {
                name: format!("gpio{}", port.name().to_ascii_lowercase()),
                base: port.base(),
                size: BLOCK_SIZE,
                irq: None,
                gate: Some(ClockGate::Gpio(port)),
                dev: Box::new(GpioPort::new(port)),
            });
        }

        for block in TimerBlock::ALL {
            bus.add_peripheral(PeripheralEntry {
                name: format!("timer{}", block.index()),
                base: block.base(),
                size: BLOCK_SIZE,
                irq: Some(block.irq_a()),
                gate: Some(ClockGate::Timer(block)),
                dev: Box::new(GpTimer::new(block)),
            });
        }

        let nvic = Nvic::new(bus.nvic.clone());
        bus.add_peripheral(PeripheralEntry {
            name: "nvic".to_string(),
            base: NVIC_BASE,
            size: NVIC_SIZE,
            irq: None,
            gate: None,
            dev: Box::new(nvic),
        });

        bus
    }

    /// A bus with nothing mapped.
    pub fn empty() -> Self {
        Self {
            peripherals: Vec::new(),
            nvic: Arc::new(NvicState::default()),
            pin_changes: Vec::new(),
        }
    }

    pub fn add_peripheral(&mut self, entry: PeripheralEntry) {
        tracing::debug!(
            "Mapping {} at {:#010x}..{:#010x}",
            entry.name,
            entry.base,
            entry.base as u64 + entry.size as u64
        );
        self.peripherals.push(entry);
    }

    fn find(&self, addr: u32) -> SimResult<usize> {
        self.peripherals
            .iter()
            .position(|p| p.contains(addr))
            .ok_or(SimulationError::MemoryViolation(addr))
    }

    /// Resolve `addr` to a clocked peripheral.
    fn route(&self, addr: u32) -> SimResult<usize> {
        let index = self.find(addr)?;
        let entry = &self.peripherals[index];
        if let (Some(gate), Some(sysctl)) = (entry.gate, self.sysctl()) {
            if !sysctl.is_clocked(gate) {
                return Err(SimulationError::PeripheralNotClocked {
                    peripheral: entry.name.clone(),
                    addr,
                });
            }
        }
        Ok(index)
    }

    pub fn read_u32(&self, addr: u32) -> SimResult<u32> {
        if addr % 4 != 0 {
            return Err(SimulationError::UnalignedAccess(addr));
        }
        let index = self.route(addr)?;
        let p = &self.peripherals[index];
        p.dev.read_word(addr - p.base)
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) -> SimResult<()> {
        if addr % 4 != 0 {
            return Err(SimulationError::UnalignedAccess(addr));
        }
        let index = self.route(addr)?;
        let before = self.gpio_levels(index);
        let p = &mut self.peripherals[index];
        p.dev.write_word(addr - p.base, value)?;
        self.record_pin_changes(index, before);
        Ok(())
    }

    pub fn read_u8(&self, addr: u32) -> SimResult<u8> {
        let index = self.route(addr)?;
        let p = &self.peripherals[index];
        p.dev.read(addr - p.base)
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) -> SimResult<()> {
        let index = self.route(addr)?;
        let before = self.gpio_levels(index);
        let p = &mut self.peripherals[index];
        p.dev.write(addr - p.base, value)?;
        self.record_pin_changes(index, before);
        Ok(())
    }

    fn gpio_levels(&self, index: usize) -> Option<(Port, u8)> {
        self.peripherals[index]
            .dev
            .as_any()
            .and_then(|any| any.downcast_ref::<GpioPort>())
            .map(|gpio| (gpio.port(), gpio.pin_levels()))
    }

    fn record_pin_changes(&mut self, index: usize, before: Option<(Port, u8)>) {
        let (Some((port, before)), Some((_, after))) = (before, self.gpio_levels(index)) else {
            return;
        };
        let changed = before ^ after;
        for pin in (0..8).filter(|pin| changed & (1 << pin) != 0) {
            self.pin_changes.push(PinChange {
                port,
                pin,
                level: after & (1 << pin) != 0,
            });
        }
    }

    /// Pin transitions since the last call, oldest first.
    pub fn take_pin_changes(&mut self) -> Vec<PinChange> {
        std::mem::take(&mut self.pin_changes)
    }

    /// Drive an input pin from outside the chip.
    pub fn drive_input(&mut self, port: Port, pin: u8, high: bool) {
        let Some(index) = self.peripherals.iter().position(|p| {
            p.dev
                .as_any()
                .and_then(|any| any.downcast_ref::<GpioPort>())
                .is_some_and(|g| g.port() == port)
        }) else {
            tracing::warn!("No GPIO port {} on this bus", port.name());
            return;
        };
        let before = self.gpio_levels(index);
        if let Some(gpio) = self.peripherals[index]
            .dev
            .as_any_mut()
            .and_then(|any| any.downcast_mut::<GpioPort>())
        {
            gpio.set_input_level(pin, high);
        }
        self.record_pin_changes(index, before);
    }

    pub fn sysctl(&self) -> Option<&SysCtl> {
        self.peripherals
            .iter()
            .find_map(|p| p.dev.as_any().and_then(|any| any.downcast_ref::<SysCtl>()))
    }

    pub fn gpio(&self, port: Port) -> Option<&GpioPort> {
        self.peripherals.iter().find_map(|p| {
            p.dev
                .as_any()
                .and_then(|any| any.downcast_ref::<GpioPort>())
                .filter(|g| g.port() == port)
        })
    }

    pub fn timer(&self, block: TimerBlock) -> Option<&GpTimer> {
        self.peripherals.iter().find_map(|p| {
            p.dev
                .as_any()
                .and_then(|any| any.downcast_ref::<GpTimer>())
                .filter(|t| t.block() == block)
        })
    }

    /// Clocks until the soonest peripheral event.
    pub fn cycles_until_event(&self) -> Option<u64> {
        self.peripherals
            .iter()
            .filter_map(|p| p.dev.cycles_until_event())
            .min()
    }

    pub fn advance(&mut self, cycles: u64) {
        for p in &mut self.peripherals {
            p.dev.advance(cycles);
        }
    }

    /// Pend every IRQ whose line is currently asserted.
    pub fn sample_irq_lines(&self) {
        for p in &self.peripherals {
            if let Some(irq) = p.irq {
                if p.dev.irq_line() && !self.nvic.is_pending(irq) {
                    tracing::trace!("{} asserts {}", p.name, irq);
                    self.nvic.set_pending(irq);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm4c_blinky::regs::*;

    #[test]
    fn test_unmapped_address_faults() {
        let bus = SystemBus::new();
        assert_eq!(
            bus.read_u32(0x5000_0000),
            Err(SimulationError::MemoryViolation(0x5000_0000))
        );
    }

    #[test]
    fn test_gated_block_faults_until_clocked() {
        let mut bus = SystemBus::new();
        let den = GPIO_PORTF_BASE + GPIO_DEN;
        assert!(matches!(
            bus.write_u32(den, 0x0E),
            Err(SimulationError::PeripheralNotClocked { ref peripheral, .. }) if peripheral == "gpiof"
        ));

        bus.write_u32(SYSCTL_RCGCGPIO, 1 << 5).unwrap();
        bus.write_u32(den, 0x0E).unwrap();
        assert_eq!(bus.read_u32(den).unwrap(), 0x0E);
    }

    #[test]
    fn test_unaligned_word_access_faults() {
        let bus = SystemBus::new();
        assert_eq!(
            bus.read_u32(SYSCTL_RCC + 2),
            Err(SimulationError::UnalignedAccess(SYSCTL_RCC + 2))
        );
        assert_eq!(bus.read_u8(SYSCTL_RCC + 3).unwrap(), (RCC_RESET >> 24) as u8);
    }

    #[test]
    fn test_pin_changes_recorded_per_pin() {
        let mut bus = SystemBus::new();
        bus.write_u32(SYSCTL_RCGCGPIO, 1 << 5).unwrap();
        bus.write_u32(GPIO_PORTF_BASE + GPIO_DIR, 0x0E).unwrap();
        bus.write_u32(GPIO_PORTF_BASE + GPIO_DEN, 0x0E).unwrap();
        assert!(bus.take_pin_changes().is_empty());

        bus.write_u32(GPIO_PORTF_BASE + (0x0A << 2), 0xFF).unwrap();
        let changes = bus.take_pin_changes();
        assert_eq!(
            changes,
            vec![
                PinChange { port: Port::F, pin: 1, level: true },
                PinChange { port: Port::F, pin: 3, level: true },
            ]
        );

        // Same level again: nothing new.
        bus.write_u32(GPIO_PORTF_BASE + (0x0A << 2), 0xFF).unwrap();
        assert!(bus.take_pin_changes().is_empty());
    }

    #[test]
    fn test_timer_line_pends_nvic() {
        let mut bus = SystemBus::new();
        let t0 = TIMER0_BASE;
        bus.write_u32(SYSCTL_RCGCTIMER, 1).unwrap();
        bus.write_u32(t0 + GPTM_TAMR, GPTM_TAMR_PERIODIC).unwrap();
        bus.write_u32(t0 + GPTM_TAILR, 9).unwrap();
        bus.write_u32(t0 + GPTM_IMR, 1).unwrap();
        bus.write_u32(t0 + GPTM_CTL, GPTM_CTL_TAEN).unwrap();

        assert_eq!(bus.cycles_until_event(), Some(9));
        bus.advance(9);
        bus.sample_irq_lines();
        assert!(bus.nvic.is_pending(Irq::TIMER0A));
        // Pending but not enabled yet.
        assert_eq!(bus.nvic.highest_pending_enabled(), None);
    }

    #[test]
    fn test_lookup_helpers() {
        let bus = SystemBus::new();
        assert_eq!(bus.sysctl().map(|s| s.clock_hz()), Some(16_000_000));
        assert_eq!(bus.gpio(Port::F).map(|g| g.port()), Some(Port::F));
        assert_eq!(
            bus.timer(TimerBlock::Timer3).map(|t| t.block()),
            Some(TimerBlock::Timer3)
        );
    }

    #[test]
    fn test_driven_input_reads_back_and_reports_change() {
        let mut bus = SystemBus::new();
        bus.write_u32(SYSCTL_RCGCGPIO, 1 << 5).unwrap();
        // PF4 digital input.
        bus.write_u32(GPIO_PORTF_BASE + GPIO_DEN, 0x10).unwrap();

        bus.drive_input(Port::F, 4, true);
        assert_eq!(bus.read_u32(GPIO_PORTF_BASE + (0x10 << 2)).unwrap(), 0x10);
        assert_eq!(
            bus.take_pin_changes(),
            vec![PinChange { port: Port::F, pin: 4, level: true }]
        );

        // Not a digital input: the level is held but not visible.
        bus.drive_input(Port::F, 0, true);
        assert_eq!(bus.read_u32(GPIO_PORTF_BASE + (0x01 << 2)).unwrap(), 0);
        assert!(bus.take_pin_changes().is_empty());
    }

    #[test]
    fn test_byte_writes_merge_into_registers() {
        let mut bus = SystemBus::new();
        bus.write_u8(SYSCTL_RCGCGPIO, 1 << 5).unwrap();
        bus.write_u8(SYSCTL_RCGCTIMER, 1).unwrap();

        bus.write_u8(GPIO_PORTF_BASE + GPIO_DIR, 0x0E).unwrap();
        bus.write_u8(GPIO_PORTF_BASE + GPIO_DEN, 0x0E).unwrap();
        bus.write_u8(GPIO_PORTF_BASE + (0x04 << 2), 0xFF).unwrap();
        assert_eq!(
            bus.take_pin_changes(),
            vec![PinChange { port: Port::F, pin: 2, level: true }]
        );

        let tailr = TIMER0_BASE + GPTM_TAILR;
        bus.write_u32(tailr, 0x0000_00AB).unwrap();
        bus.write_u8(tailr + 1, 0x12).unwrap();
        assert_eq!(bus.read_u32(tailr).unwrap(), 0x0000_12AB);
        assert_eq!(bus.read_u8(tailr + 1).unwrap(), 0x12);
    }
}
