// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use tm4c_blinky::gpio::Port;
use tm4c_blinky::regs::*;

/// Top of the address-masked DATA window.
const DATA_WINDOW_END: u32 = 0x400;

/// TM4C123 GPIO port on the APB aperture.
///
/// DATA is address-masked: offset bits [9:2] select which pins an access
/// sees. Only digital push-pull behaviour is modelled; pull resistors and
/// drive strength are stored but do not affect levels.
#[derive(Debug, serde::Serialize)]
pub struct GpioPort {
    #[serde(serialize_with = "serialize_port")]
    port: Port,
    data: u8,
    dir: u8,
    afsel: u8,
    dr2r: u8,
    odr: u8,
    pur: u8,
    pdr: u8,
    den: u8,
    /// Externally driven levels for input pins.
    inputs: u8,
}

fn serialize_port<S: serde::Serializer>(port: &Port, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_char(port.name())
}

impl GpioPort {
    pub fn new(port: Port) -> Self {
        Self {
            port,
            data: 0,
            dir: 0,
            afsel: 0,
            // 2 mA drive is selected out of reset.
            dr2r: 0xFF,
            odr: 0,
            pur: 0,
            pdr: 0,
            den: 0,
            inputs: 0,
        }
    }

    pub fn port(&self) -> Port {
        self.port
    }

    /// Pins currently driven as digital GPIO outputs.
    pub fn output_mask(&self) -> u8 {
        self.dir & self.den & !self.afsel
    }

    /// Level seen on each pin: driven outputs follow DATA, digital inputs
    /// follow the external level, everything else reads low.
    pub fn pin_levels(&self) -> u8 {
        let outputs = self.output_mask();
        let inputs = self.den & !self.dir & !self.afsel;
        (self.data & outputs) | (self.inputs & inputs)
    }

    pub fn pin_level(&self, pin: u8) -> bool {
        pin < 8 && self.pin_levels() & (1 << pin) != 0
    }

    pub fn set_input_level(&mut self, pin: u8, high: bool) {
        if pin >= 8 {
            return;
        }
        if high {
            self.inputs |= 1 << pin;
        } else {
            self.inputs &= !(1 << pin);
        }
    }

    fn read_reg(&self, offset: u32) -> u32 {
        if offset < DATA_WINDOW_END {
            let mask = (offset >> 2) as u8;
            return (self.pin_levels() & mask) as u32;
        }
        let value = match offset {
            GPIO_DIR => self.dir,
            GPIO_AFSEL => self.afsel,
            GPIO_DR2R => self.dr2r,
            GPIO_ODR => self.odr,
            GPIO_PUR => self.pur,
            GPIO_PDR => self.pdr,
            GPIO_DEN => self.den,
            _ => 0,
        };
        value as u32
    }

    fn write_reg(&mut self, offset: u32, value: u32) {
        let value = value as u8;
        if offset < DATA_WINDOW_END {
            let mask = (offset >> 2) as u8;
            self.data = (self.data & !mask) | (value & mask);
            return;
        }
        match offset {
            GPIO_DIR => self.dir = value,
            GPIO_AFSEL => self.afsel = value,
            GPIO_DR2R => self.dr2r = value,
            GPIO_ODR => self.odr = value,
            GPIO_PUR => self.pur = value,
            GPIO_PDR => self.pdr = value,
            GPIO_DEN => self.den = value,
            _ => {}
        }
    }
}

impl crate::Peripheral for GpioPort {
    fn read(&self, offset: u32) -> SimResult<u8> {
        let reg_val = self.read_reg(offset & !3);
        Ok((reg_val >> ((offset % 4) * 8)) as u8)
    }

    fn write(&mut self, offset: u32, value: u8) -> SimResult<()> {
        // Every modelled register is eight bits wide.
        if offset % 4 == 0 {
            self.write_reg(offset, value as u32);
        }
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
            map.insert("levels".to_string(), self.pin_levels().into());
        }
        value
    }
}
