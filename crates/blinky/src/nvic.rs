// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::hw::Hardware;
use crate::regs::{NVIC_DIS0, NVIC_EN0, NVIC_PEND0, NVIC_UNPEND0};

/// Device interrupt number (IPSR exception number minus 16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Irq(u16);

impl Irq {
    pub const TIMER0A: Irq = Irq(19);
    pub const TIMER0B: Irq = Irq(20);
    pub const TIMER1A: Irq = Irq(21);
    pub const TIMER1B: Irq = Irq(22);
    pub const TIMER2A: Irq = Irq(23);
    pub const TIMER2B: Irq = Irq(24);
    pub const GPIOF: Irq = Irq(30);
    pub const TIMER3A: Irq = Irq(35);
    pub const TIMER3B: Irq = Irq(36);
    pub const TIMER4A: Irq = Irq(70);
    pub const TIMER4B: Irq = Irq(71);
    pub const TIMER5A: Irq = Irq(92);
    pub const TIMER5B: Irq = Irq(93);

    /// Highest interrupt number on the TM4C123GH6PM.
    pub const MAX: u16 = 138;

    pub const fn new(number: u16) -> Option<Irq> {
        if number <= Self::MAX {
            Some(Irq(number))
        } else {
            None
        }
    }

    pub const fn number(self) -> u16 {
        self.0
    }

    pub const fn exception_number(self) -> u32 {
        self.0 as u32 + 16
    }

    /// (register offset from the *0 register, bit mask)
    const fn slot(self) -> (u32, u32) {
        (4 * (self.0 as u32 / 32), 1 << (self.0 as u32 % 32))
    }
}

impl core::fmt::Display for Irq {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "IRQ{}", self.0)
    }
}

pub fn enable_irq<H: Hardware + ?Sized>(hw: &mut H, irq: Irq) {
    let (offset, bit) = irq.slot();
    hw.write(NVIC_EN0 + offset, bit);
}

pub fn disable_irq<H: Hardware + ?Sized>(hw: &mut H, irq: Irq) {
    let (offset, bit) = irq.slot();
    hw.write(NVIC_DIS0 + offset, bit);
}

pub fn pend_irq<H: Hardware + ?Sized>(hw: &mut H, irq: Irq) {
    let (offset, bit) = irq.slot();
    hw.write(NVIC_PEND0 + offset, bit);
}

pub fn unpend_irq<H: Hardware + ?Sized>(hw: &mut H, irq: Irq) {
    let (offset, bit) = irq.slot();
    hw.write(NVIC_UNPEND0 + offset, bit);
}

pub fn is_enabled<H: Hardware + ?Sized>(hw: &H, irq: Irq) -> bool {
    let (offset, bit) = irq.slot();
    hw.read(NVIC_EN0 + offset) & bit != 0
}
