// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::hw::Hardware;
use crate::regs::*;
use bitflags::bitflags;

bitflags! {
    /// A set of pins within one GPIO port.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Pins: u8 {
        const PIN_0 = 1 << 0;
        const PIN_1 = 1 << 1;
        const PIN_2 = 1 << 2;
        const PIN_3 = 1 << 3;
        const PIN_4 = 1 << 4;
        const PIN_5 = 1 << 5;
        const PIN_6 = 1 << 6;
        const PIN_7 = 1 << 7;
    }
}

impl Pins {
    pub const fn pin(n: u8) -> Option<Pins> {
        if n < 8 {
            Some(Pins::from_bits_retain(1 << n))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Port {
    pub const ALL: [Port; 6] = [Port::A, Port::B, Port::C, Port::D, Port::E, Port::F];

    pub const fn base(self) -> u32 {
        match self {
            Port::A => GPIO_PORTA_BASE,
            Port::B => GPIO_PORTB_BASE,
            Port::C => GPIO_PORTC_BASE,
            Port::D => GPIO_PORTD_BASE,
            Port::E => GPIO_PORTE_BASE,
            Port::F => GPIO_PORTF_BASE,
        }
    }

    /// Bit position in RCGCGPIO/PRGPIO.
    pub const fn index(self) -> u32 {
        match self {
            Port::A => 0,
            Port::B => 1,
            Port::C => 2,
            Port::D => 3,
            Port::E => 4,
            Port::F => 5,
        }
    }

    pub const fn name(self) -> char {
        match self {
            Port::A => 'A',
            Port::B => 'B',
            Port::C => 'C',
            Port::D => 'D',
            Port::E => 'E',
            Port::F => 'F',
        }
    }

    pub fn from_name(name: char) -> Option<Port> {
        Port::ALL
            .into_iter()
            .find(|p| p.name() == name.to_ascii_uppercase())
    }

    /// DATA alias that exposes exactly `pins`.
    pub const fn data_addr(self, pins: Pins) -> u32 {
        self.base() + GPIO_DATA + ((pins.bits() as u32) << 2)
    }
}

/// Make `pins` 2 mA push-pull digital outputs, driven low.
pub fn pin_type_output<H: Hardware + ?Sized>(hw: &mut H, port: Port, pins: Pins) {
    let base = port.base();
    let mask = pins.bits() as u32;

    pin_write(hw, port, pins, Pins::empty());
    hw.set_bits(base + GPIO_DIR, mask);
    hw.clear_bits(base + GPIO_AFSEL, mask);
    hw.set_bits(base + GPIO_DR2R, mask);
    hw.clear_bits(base + GPIO_ODR, mask);
    hw.clear_bits(base + GPIO_PUR, mask);
    hw.clear_bits(base + GPIO_PDR, mask);
    hw.set_bits(base + GPIO_DEN, mask);
}

/// Levels of `pins`; pins outside the set read as zero.
pub fn pin_read<H: Hardware + ?Sized>(hw: &H, port: Port, pins: Pins) -> Pins {
    Pins::from_bits_truncate(hw.read(port.data_addr(pins)) as u8)
}

/// Drive `pins` to the matching bits of `value`; other pins are untouched.
pub fn pin_write<H: Hardware + ?Sized>(hw: &mut H, port: Port, pins: Pins, value: Pins) {
    hw.write(port.data_addr(pins), value.bits() as u32);
}
