// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! General-purpose timer blocks, used concatenated as 32-bit timer A.

use crate::hw::Hardware;
use crate::nvic::Irq;
use crate::regs::*;
use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerBlock {
    Timer0,
    Timer1,
    Timer2,
    Timer3,
    Timer4,
    Timer5,
}

impl TimerBlock {
    pub const ALL: [TimerBlock; 6] = [
        TimerBlock::Timer0,
        TimerBlock::Timer1,
        TimerBlock::Timer2,
        TimerBlock::Timer3,
        TimerBlock::Timer4,
        TimerBlock::Timer5,
    ];

    /// Bit position in RCGCTIMER/PRTIMER; also the block number.
    pub const fn index(self) -> u32 {
        match self {
            TimerBlock::Timer0 => 0,
            TimerBlock::Timer1 => 1,
            TimerBlock::Timer2 => 2,
            TimerBlock::Timer3 => 3,
            TimerBlock::Timer4 => 4,
            TimerBlock::Timer5 => 5,
        }
    }

    pub const fn base(self) -> u32 {
        TIMER0_BASE + self.index() * TIMER_BLOCK_STRIDE
    }

    pub fn from_index(index: u32) -> Option<TimerBlock> {
        TimerBlock::ALL.get(index as usize).copied()
    }

    /// Interrupt line of subtimer A.
    pub const fn irq_a(self) -> Irq {
        match self {
            TimerBlock::Timer0 => Irq::TIMER0A,
            TimerBlock::Timer1 => Irq::TIMER1A,
            TimerBlock::Timer2 => Irq::TIMER2A,
            TimerBlock::Timer3 => Irq::TIMER3A,
            TimerBlock::Timer4 => Irq::TIMER4A,
            TimerBlock::Timer5 => Irq::TIMER5A,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    OneShot,
    Periodic,
}

bitflags! {
    /// GPTM interrupt sources as laid out in IMR/RIS/MIS/ICR.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TimerInterrupts: u32 {
        const TIMEOUT_A = 1 << 0;
        const CAPTURE_MATCH_A = 1 << 1;
        const CAPTURE_EVENT_A = 1 << 2;
        const RTC = 1 << 3;
        const MATCH_A = 1 << 4;
        const TIMEOUT_B = 1 << 8;
        const CAPTURE_MATCH_B = 1 << 9;
        const CAPTURE_EVENT_B = 1 << 10;
        const MATCH_B = 1 << 11;
    }
}

/// Interval-load value whose time-outs toggle an output at `toggle_hz`
/// with a 50% duty cycle.
///
/// Each time-out flips the output once, so the timer runs at twice the
/// toggle rate. The counter fires on reaching zero and spends one more
/// cycle reloading, hence the `- 1`. `None` when `toggle_hz` is zero or
/// the half period is shorter than one clock.
pub const fn reload_value(clock_hz: u32, toggle_hz: u32) -> Option<u32> {
    if toggle_hz == 0 {
        return None;
    }
    (clock_hz / toggle_hz / 2).checked_sub(1)
}

/// Stop timer A and select full-width `mode`, counting down.
pub fn configure<H: Hardware + ?Sized>(hw: &mut H, timer: TimerBlock, mode: Mode) {
    let base = timer.base();
    hw.clear_bits(base + GPTM_CTL, GPTM_CTL_TAEN | GPTM_CTL_TBEN);
    hw.write(base + GPTM_CFG, GPTM_CFG_32BIT);
    let tamr = match mode {
        Mode::OneShot => GPTM_TAMR_ONESHOT,
        Mode::Periodic => GPTM_TAMR_PERIODIC,
    };
    hw.write(base + GPTM_TAMR, tamr);
}

pub fn load_set<H: Hardware + ?Sized>(hw: &mut H, timer: TimerBlock, value: u32) {
    hw.write(timer.base() + GPTM_TAILR, value);
}

pub fn int_enable<H: Hardware + ?Sized>(hw: &mut H, timer: TimerBlock, ints: TimerInterrupts) {
    hw.set_bits(timer.base() + GPTM_IMR, ints.bits());
}

pub fn int_disable<H: Hardware + ?Sized>(hw: &mut H, timer: TimerBlock, ints: TimerInterrupts) {
    hw.clear_bits(timer.base() + GPTM_IMR, ints.bits());
}

/// Acknowledge `ints`. ICR is write-1-to-clear, so repeating the write
/// is harmless.
pub fn int_clear<H: Hardware + ?Sized>(hw: &mut H, timer: TimerBlock, ints: TimerInterrupts) {
    hw.write(timer.base() + GPTM_ICR, ints.bits());
}

pub fn int_status<H: Hardware + ?Sized>(hw: &H, timer: TimerBlock, masked: bool) -> TimerInterrupts {
    let reg = if masked { GPTM_MIS } else { GPTM_RIS };
    TimerInterrupts::from_bits_truncate(hw.read(timer.base() + reg))
}

pub fn enable<H: Hardware + ?Sized>(hw: &mut H, timer: TimerBlock) {
    hw.set_bits(timer.base() + GPTM_CTL, GPTM_CTL_TAEN);
}

pub fn disable<H: Hardware + ?Sized>(hw: &mut H, timer: TimerBlock) {
    hw.clear_bits(timer.base() + GPTM_CTL, GPTM_CTL_TAEN);
}

/// Current count of timer A.
pub fn value_get<H: Hardware + ?Sized>(hw: &H, timer: TimerBlock) -> u32 {
    hw.read(timer.base() + GPTM_TAR)
}
