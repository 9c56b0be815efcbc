// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use tm4c_blinky::regs::*;
use tm4c_blinky::timer::{TimerBlock, TimerInterrupts};

const TATORIS: u32 = TimerInterrupts::TIMEOUT_A.bits();

/// TM4C123 16/32-bit general-purpose timer, modelled as concatenated
/// 32-bit timer A counting down.
///
/// The counter fires when it reaches zero and reloads from TAILR on the
/// following clock, so a periodic timer with TAILR = N times out every
/// N + 1 clocks. Timer B registers are stored but never count.
#[derive(Debug, serde::Serialize)]
pub struct GpTimer {
    #[serde(skip)]
    block: TimerBlock,
    cfg: u32,
    tamr: u32,
    ctl: u32,
    imr: u32,
    ris: u32,
    tailr: u32,
    /// Current value of timer A.
    count: u32,
    timeouts: u64,
}

impl GpTimer {
    pub fn new(block: TimerBlock) -> Self {
        Self {
            block,
            cfg: 0,
            tamr: 0,
            ctl: 0,
            imr: 0,
            ris: 0,
            tailr: 0xFFFF_FFFF,
            count: 0xFFFF_FFFF,
            timeouts: 0,
        }
    }

    pub fn block(&self) -> TimerBlock {
        self.block
    }

    pub fn enabled(&self) -> bool {
        self.ctl & GPTM_CTL_TAEN != 0
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn interval_load(&self) -> u32 {
        self.tailr
    }

    /// Time-outs since reset.
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    pub fn masked_status(&self) -> u32 {
        self.ris & self.imr
    }

    fn periodic(&self) -> bool {
        self.tamr & GPTM_TAMR_MODE_MASK == GPTM_TAMR_PERIODIC
    }

    fn timeout(&mut self) {
        self.ris |= TATORIS;
        self.timeouts += 1;
        if !self.periodic() {
            // One-shot: hardware clears TAEN.
            self.ctl &= !GPTM_CTL_TAEN;
        }
    }

    fn start(&mut self) {
        if self.cfg != GPTM_CFG_32BIT {
            tracing::warn!(
                "Timer{}: CFG {:#x} not modelled, counting as 32-bit",
                self.block.index(),
                self.cfg
            );
        }
        match self.tamr & GPTM_TAMR_MODE_MASK {
            GPTM_TAMR_ONESHOT | GPTM_TAMR_PERIODIC => {}
            mode => tracing::warn!(
                "Timer{}: TAMR mode {} not modelled, running one-shot",
                self.block.index(),
                mode
            ),
        }
        if self.tamr & GPTM_TAMR_TACDIR != 0 {
            tracing::warn!(
                "Timer{}: count-up requested, counting down",
                self.block.index()
            );
        }
        self.count = self.tailr;
    }

    fn read_reg(&self, offset: u32) -> u32 {
        match offset {
            GPTM_CFG => self.cfg,
            GPTM_TAMR => self.tamr,
            GPTM_CTL => self.ctl,
            GPTM_IMR => self.imr,
            GPTM_RIS => self.ris,
            GPTM_MIS => self.masked_status(),
            GPTM_TAILR => self.tailr,
            GPTM_TAR | GPTM_TAV => self.count,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u32, value: u32) {
        match offset {
            GPTM_CFG => self.cfg = value & 0x7,
            GPTM_TAMR => self.tamr = value & 0xFFF,
            GPTM_CTL => {
                let rising = value & GPTM_CTL_TAEN != 0 && !self.enabled();
                self.ctl = value & 0xFFFF;
                if rising {
                    self.start();
                }
            }
            GPTM_IMR => self.imr = value & 0xF1F,
            // Write-1-to-clear.
            GPTM_ICR => self.ris &= !value,
            GPTM_TAILR => {
                self.tailr = value;
                // TAILD = 0: the counter takes the new value immediately.
                self.count = value;
            }
            GPTM_TAV => self.count = value,
            _ => {}
        }
    }
}

impl crate::Peripheral for GpTimer {
    fn read(&self, offset: u32) -> SimResult<u8> {
        let reg_val = self.read_reg(offset & !3);
        Ok((reg_val >> ((offset % 4) * 8)) as u8)
    }

    fn write(&mut self, offset: u32, value: u8) -> SimResult<()> {
        let reg_offset = offset & !3;
        let shift = (offset % 4) * 8;
        // ICR is write-only; merge against zero so other lanes stay clear.
        let mut reg_val = if reg_offset == GPTM_ICR {
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

    fn tick(&mut self) -> crate::PeripheralTickResult {
        let enabled = self.enabled();
        self.advance(1);
        crate::PeripheralTickResult {
            irq: self.irq_line(),
            cycles: u32::from(enabled),
        }
    }

    fn cycles_until_event(&self) -> Option<u64> {
        if !self.enabled() {
            return None;
        }
        if self.count == 0 {
            // One clock to reload, then a full countdown.
            return Some(if self.tailr == 0 {
                1
            } else {
                self.tailr as u64 + 1
            });
        }
        Some(self.count as u64)
    }

    fn advance(&mut self, mut cycles: u64) {
        while cycles > 0 && self.enabled() {
            if self.count == 0 {
                self.count = self.tailr;
                cycles -= 1;
                if self.tailr == 0 {
                    self.timeout();
                }
                continue;
            }

            let step = cycles.min(self.count as u64);
            self.count -= step as u32;
            cycles -= step;
            if self.count == 0 {
                self.timeout();
            }
        }
    }

    fn irq_line(&self) -> bool {
        self.masked_status() != 0
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
