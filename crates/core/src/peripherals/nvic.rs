// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{Peripheral, SimResult};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tm4c_blinky::regs::{NVIC_DIS0, NVIC_EN0, NVIC_PEND0, NVIC_UNPEND0};
use tm4c_blinky::Irq;

pub const NVIC_BASE: u32 = NVIC_EN0;
/// EN, DIS, PEND, UNPEND and ACTIVE banks.
pub const NVIC_SIZE: u32 = 0x220;

const EN: u32 = 0;
const DIS: u32 = NVIC_DIS0 - NVIC_EN0;
const PEND: u32 = NVIC_PEND0 - NVIC_EN0;
const UNPEND: u32 = NVIC_UNPEND0 - NVIC_EN0;
const ACTIVE: u32 = 0x200;
const BANK: u32 = 0x20;

const WORDS: usize = 8;

fn slot(irq: Irq) -> (usize, u32) {
    let n = irq.number() as usize;
    (n / 32, 1 << (n % 32))
}

/// Shared state for NVIC registers, indexed by device IRQ number.
#[derive(Debug, Default)]
pub struct NvicState {
    pub iser: [AtomicU32; WORDS],
    pub ispr: [AtomicU32; WORDS],
    pub iabr: [AtomicU32; WORDS],
}

impl NvicState {
    pub fn is_enabled(&self, irq: Irq) -> bool {
        let (idx, bit) = slot(irq);
        self.iser[idx].load(Ordering::SeqCst) & bit != 0
    }

    pub fn is_pending(&self, irq: Irq) -> bool {
        let (idx, bit) = slot(irq);
        self.ispr[idx].load(Ordering::SeqCst) & bit != 0
    }

    pub fn is_active(&self, irq: Irq) -> bool {
        let (idx, bit) = slot(irq);
        self.iabr[idx].load(Ordering::SeqCst) & bit != 0
    }

    pub fn set_pending(&self, irq: Irq) {
        let (idx, bit) = slot(irq);
        self.ispr[idx].fetch_or(bit, Ordering::SeqCst);
    }

    pub fn clear_pending(&self, irq: Irq) {
        let (idx, bit) = slot(irq);
        self.ispr[idx].fetch_and(!bit, Ordering::SeqCst);
    }

    pub fn set_active(&self, irq: Irq, active: bool) {
        let (idx, bit) = slot(irq);
        if active {
            self.iabr[idx].fetch_or(bit, Ordering::SeqCst);
        } else {
            self.iabr[idx].fetch_and(!bit, Ordering::SeqCst);
        }
    }

    /// Lowest-numbered IRQ that is both pending and enabled and not already
    /// active. All priorities are left at reset, so number decides.
    pub fn highest_pending_enabled(&self) -> Option<Irq> {
        (0..WORDS).find_map(|idx| {
            let ready = self.iser[idx].load(Ordering::SeqCst)
                & self.ispr[idx].load(Ordering::SeqCst)
                & !self.iabr[idx].load(Ordering::SeqCst);
            if ready == 0 {
                return None;
            }
            Irq::new((idx as u32 * 32 + ready.trailing_zeros()) as u16)
        })
    }
}

/// Nested Vectored Interrupt Controller register window.
#[derive(Debug, Clone)]
pub struct Nvic {
    pub state: Arc<NvicState>,
}

impl Nvic {
    pub fn new(state: Arc<NvicState>) -> Self {
        Self { state }
    }

    fn read_reg(&self, offset: u32) -> u32 {
        let idx = ((offset % BANK) / 4) as usize;
        let bank = match offset / BANK * BANK {
            // Set and clear views of the same bits.
            EN | DIS => &self.state.iser,
            PEND | UNPEND => &self.state.ispr,
            ACTIVE => &self.state.iabr,
            _ => return 0,
        };
        bank[idx].load(Ordering::SeqCst)
    }

    fn write_reg(&mut self, offset: u32, value: u32) {
        let idx = ((offset % BANK) / 4) as usize;
        match offset / BANK * BANK {
            EN => {
                self.state.iser[idx].fetch_or(value, Ordering::SeqCst);
            }
            DIS => {
                self.state.iser[idx].fetch_and(!value, Ordering::SeqCst);
            }
            PEND => {
                self.state.ispr[idx].fetch_or(value, Ordering::SeqCst);
            }
            UNPEND => {
                self.state.ispr[idx].fetch_and(!value, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}

impl Peripheral for Nvic {
    fn read(&self, offset: u32) -> SimResult<u8> {
        let val = self.read_reg(offset & !3);
        Ok((val >> ((offset % 4) * 8)) as u8)
    }

    fn write(&mut self, offset: u32, value: u8) -> SimResult<()> {
        // Set/clear registers only act on the ones written.
        let mask = (value as u32) << ((offset % 4) * 8);
        self.write_reg(offset & !3, mask);
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

    fn snapshot(&self) -> serde_json::Value {
        let dump = |bank: &[AtomicU32; WORDS]| -> Vec<u32> {
            bank.iter().map(|a| a.load(Ordering::Relaxed)).collect()
        };
        serde_json::json!({
            "iser": dump(&self.state.iser),
            "ispr": dump(&self.state.ispr),
            "iabr": dump(&self.state.iabr),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_and_disable_views() {
        let state = Arc::new(NvicState::default());
        let mut nvic = Nvic::new(state.clone());

        nvic.write_word(EN, 1 << 19).unwrap();
        assert!(state.is_enabled(Irq::TIMER0A));
        assert_eq!(nvic.read_word(DIS).unwrap(), 1 << 19);

        // Writing zeros to EN changes nothing.
        nvic.write_word(EN, 0).unwrap();
        assert!(state.is_enabled(Irq::TIMER0A));

        nvic.write_word(DIS, 1 << 19).unwrap();
        assert!(!state.is_enabled(Irq::TIMER0A));
    }

    #[test]
    fn test_pending_selection_skips_active_and_disabled() {
        let state = NvicState::default();
        state.set_pending(Irq::TIMER0A);
        state.set_pending(Irq::TIMER4A);
        assert_eq!(state.highest_pending_enabled(), None);

        let mut nvic = Nvic::new(Arc::new(state));
        nvic.write_word(EN + 8, 1 << (70 - 64)).unwrap();
        assert_eq!(nvic.state.highest_pending_enabled(), Some(Irq::TIMER4A));

        nvic.write_word(EN, 1 << 19).unwrap();
        assert_eq!(nvic.state.highest_pending_enabled(), Some(Irq::TIMER0A));

        nvic.state.set_active(Irq::TIMER0A, true);
        assert_eq!(nvic.state.highest_pending_enabled(), Some(Irq::TIMER4A));
    }

    #[test]
    fn test_byte_writes_and_unpend() {
        let mut nvic = Nvic::new(Arc::new(NvicState::default()));
        // IRQ19 lives in byte lane 2 of PEND0.
        nvic.write(PEND + 2, 1 << 3).unwrap();
        assert!(nvic.state.is_pending(Irq::TIMER0A));
        nvic.write_word(UNPEND, 1 << 19).unwrap();
        assert!(!nvic.state.is_pending(Irq::TIMER0A));
    }
}
