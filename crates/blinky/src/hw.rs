// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::nvic::Irq;

/// Handle to the memory-mapped register file and the core's global
/// interrupt mask.
///
/// On the device this is a zero-sized MMIO token; in the simulator it
/// wraps the system bus. Drivers take it explicitly instead of poking
/// fixed addresses, so the single-writer rule for each register block
/// is visible at every call site.
pub trait Hardware {
    fn read(&self, addr: u32) -> u32;
    fn write(&mut self, addr: u32, value: u32);

    /// Clear PRIMASK (master interrupt enable).
    fn enable_interrupts(&mut self);

    /// Set PRIMASK.
    fn disable_interrupts(&mut self);

    fn set_bits(&mut self, addr: u32, bits: u32) {
        let value = self.read(addr);
        self.write(addr, value | bits);
    }

    fn clear_bits(&mut self, addr: u32, bits: u32) {
        let value = self.read(addr);
        self.write(addr, value & !bits);
    }
}

impl<H: Hardware + ?Sized> Hardware for &mut H {
    fn read(&self, addr: u32) -> u32 {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u32, value: u32) {
        (**self).write(addr, value)
    }

    fn enable_interrupts(&mut self) {
        (**self).enable_interrupts()
    }

    fn disable_interrupts(&mut self) {
        (**self).disable_interrupts()
    }
}

/// A routine bound to one interrupt line.
pub trait InterruptHandler {
    fn irq(&self) -> Irq;
    fn on_interrupt(&mut self, hw: &mut dyn Hardware);
}

#[cfg(test)]
pub(crate) mod fake {
    use super::Hardware;
    use crate::regs;
    use std::collections::BTreeMap;
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Access {
        Write(u32, u32),
        MasterEnable,
        MasterDisable,
    }

    /// Flat register file that logs every write. PLL lock and the
    /// peripheral-ready registers always read as set.
    #[derive(Debug, Default)]
    pub struct RecordingHardware {
        pub regs: BTreeMap<u32, u32>,
        pub log: Vec<Access>,
    }

    impl RecordingHardware {
        pub fn new() -> Self {
            let mut hw = Self::default();
            hw.regs.insert(regs::SYSCTL_RCC, regs::RCC_RESET);
            hw
        }

        pub fn writes_to(&self, addr: u32) -> Vec<u32> {
            self.log
                .iter()
                .filter_map(|a| match a {
                    Access::Write(a, v) if *a == addr => Some(*v),
                    _ => None,
                })
                .collect()
        }

        pub fn position(&self, access: Access) -> Option<usize> {
            self.log.iter().position(|a| *a == access)
        }

        pub fn position_of_write(&self, addr: u32) -> Option<usize> {
            self.log
                .iter()
                .position(|a| matches!(a, Access::Write(x, _) if *x == addr))
        }
    }

    impl Hardware for RecordingHardware {
        fn read(&self, addr: u32) -> u32 {
            match addr {
                regs::SYSCTL_RIS => regs::SYSCTL_PLLLRIS,
                regs::SYSCTL_PRGPIO | regs::SYSCTL_PRTIMER => 0xFFFF_FFFF,
                _ => self.regs.get(&addr).copied().unwrap_or(0),
            }
        }

        fn write(&mut self, addr: u32, value: u32) {
            self.regs.insert(addr, value);
            self.log.push(Access::Write(addr, value));
        }

        fn enable_interrupts(&mut self) {
            self.log.push(Access::MasterEnable);
        }

        fn disable_interrupts(&mut self) {
            self.log.push(Access::MasterDisable);
        }
    }
}
