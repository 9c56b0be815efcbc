// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use tm4c_blinky::regs::*;
use tm4c_blinky::sysctl::{rcc_frequency, ClockGate};

const RIS: u32 = SYSCTL_RIS - SYSCTL_BASE;
const MISC: u32 = SYSCTL_MISC - SYSCTL_BASE;
const RCC: u32 = SYSCTL_RCC - SYSCTL_BASE;
const RCGCTIMER: u32 = SYSCTL_RCGCTIMER - SYSCTL_BASE;
const RCGCGPIO: u32 = SYSCTL_RCGCGPIO - SYSCTL_BASE;
const PRTIMER: u32 = SYSCTL_PRTIMER - SYSCTL_BASE;
const PRGPIO: u32 = SYSCTL_PRGPIO - SYSCTL_BASE;

/// TM4C123 System Control: RCC clock tree, PLL lock status and the
/// run-mode clock gates for GPIO and timers.
///
/// The PLL locks as soon as it is powered and the gates report ready on the
/// same cycle they are enabled.
#[derive(Debug, serde::Serialize)]
pub struct SysCtl {
    rcc: u32,
    ris: u32,
    rcgctimer: u32,
    rcgcgpio: u32,
}

impl Default for SysCtl {
    fn default() -> Self {
        Self::new()
    }
}

impl SysCtl {
    pub fn new() -> Self {
        Self {
            rcc: RCC_RESET,
            ris: 0,
            rcgctimer: 0,
            rcgcgpio: 0,
        }
    }

    pub fn rcc(&self) -> u32 {
        self.rcc
    }

    /// Frequency decoded from RCC; zero for a reserved crystal code.
    pub fn clock_hz(&self) -> u32 {
        rcc_frequency(self.rcc).unwrap_or(0)
    }

    pub fn is_clocked(&self, gate: ClockGate) -> bool {
        match gate {
            ClockGate::Gpio(port) => self.rcgcgpio & (1 << port.index()) != 0,
            ClockGate::Timer(timer) => self.rcgctimer & (1 << timer.index()) != 0,
        }
    }

    fn read_reg(&self, offset: u32) -> u32 {
        match offset {
            RIS => self.ris,
            RCC => self.rcc,
            RCGCTIMER => self.rcgctimer,
            RCGCGPIO => self.rcgcgpio,
            PRTIMER => self.rcgctimer,
            PRGPIO => self.rcgcgpio,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u32, value: u32) {
        match offset {
            // Write-1-to-clear interrupt status.
            MISC => self.ris &= !value,
            RCC => {
                let was_powered = self.rcc & RCC_PWRDN == 0;
                self.rcc = value;
                if value & RCC_PWRDN == 0 {
                    if !was_powered {
                        tracing::debug!("SysCtl: PLL powered up, lock asserted");
                    }
                    self.ris |= SYSCTL_PLLLRIS;
                } else {
                    self.ris &= !SYSCTL_PLLLRIS;
                }
            }
            RCGCTIMER => self.rcgctimer = value & 0x3F,
            RCGCGPIO => self.rcgcgpio = value & 0x3F,
            _ => {}
        }
    }
}

impl crate::Peripheral for SysCtl {
    fn read(&self, offset: u32) -> SimResult<u8> {
        let reg_val = self.read_reg(offset & !3);
        Ok((reg_val >> ((offset % 4) * 8)) as u8)
    }

    fn write(&mut self, offset: u32, value: u8) -> SimResult<()> {
        let reg_offset = offset & !3;
        let shift = (offset % 4) * 8;
        // MISC reads as zero, so merging keeps write-1-to-clear per lane.
        let mut reg_val = if reg_offset == MISC {
            0
        } else {
            self.read_reg(reg_offset)
        };
        reg_val &= !(0xFF << shift);
        reg_val |= (value as u32) << shift;
        self.write_reg(reg_offset, reg_val);
        Ok(())
    }

    fn read_word(&self, offset: u32) -> SimResult<u32> {
        Ok(self.read_reg(offset))
    }

    fn write_word(&mut self, offset: u32, value: u32) -> SimResult<()> {
        self.write_reg(offset, value);
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(map) = value.as_object_mut() {
            map.insert("clock_hz".to_string(), self.clock_hz().into());
        }
        value
    }
}
