// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! System control: main clock tree and peripheral clock gates.

use crate::gpio::Port;
use crate::hw::Hardware;
use crate::regs::*;
use crate::timer::TimerBlock;

/// PLL output before the fixed divide-by-two.
pub const PLL_HZ: u32 = 400_000_000;
pub const PIOSC_HZ: u32 = 16_000_000;
pub const LFIOSC_HZ: u32 = 30_000;

/// Upper bound on PLL lock polls before the clock switch goes ahead anyway.
pub const PLL_LOCK_POLLS: u32 = 32_768;

/// Upper bound on peripheral-ready polls after opening a clock gate.
pub const PERIPHERAL_READY_POLLS: u32 = 1_024;

/// RCC.XTAL encodings.
const CRYSTALS: [(u32, u8); 21] = [
    (4_000_000, 0x06),
    (4_096_000, 0x07),
    (4_915_200, 0x08),
    (5_000_000, 0x09),
    (5_120_000, 0x0A),
    (6_000_000, 0x0B),
    (6_144_000, 0x0C),
    (7_372_800, 0x0D),
    (8_000_000, 0x0E),
    (8_192_000, 0x0F),
    (10_000_000, 0x10),
    (12_000_000, 0x11),
    (12_288_000, 0x12),
    (13_560_000, 0x13),
    (14_318_180, 0x14),
    (16_000_000, 0x15),
    (16_384_000, 0x16),
    (18_000_000, 0x17),
    (20_000_000, 0x18),
    (24_000_000, 0x19),
    (25_000_000, 0x1A),
];

/// A main-oscillator crystal the PLL reference can be derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crystal {
    hz: u32,
    code: u8,
}

impl Crystal {
    pub const MHZ_16: Crystal = Crystal {
        hz: 16_000_000,
        code: 0x15,
    };

    pub fn from_hz(hz: u32) -> Option<Self> {
        CRYSTALS
            .iter()
            .find(|(f, _)| *f == hz)
            .map(|&(hz, code)| Self { hz, code })
    }

    pub fn from_code(code: u8) -> Option<Self> {
        CRYSTALS
            .iter()
            .find(|(_, c)| *c == code)
            .map(|&(hz, code)| Self { hz, code })
    }

    pub const fn hz(self) -> u32 {
        self.hz
    }

    pub const fn code(self) -> u8 {
        self.code
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscSource {
    Main,
    PrecisionInternal,
    PrecisionInternalDiv4,
    LowFrequencyInternal,
}

impl OscSource {
    const fn field(self) -> u32 {
        match self {
            OscSource::Main => 0,
            OscSource::PrecisionInternal => 1,
            OscSource::PrecisionInternalDiv4 => 2,
            OscSource::LowFrequencyInternal => 3,
        }
    }

    const fn from_field(field: u32) -> Self {
        match field & 0x3 {
            0 => OscSource::Main,
            1 => OscSource::PrecisionInternal,
            2 => OscSource::PrecisionInternalDiv4,
            _ => OscSource::LowFrequencyInternal,
        }
    }

    const fn hz(self, crystal: Crystal) -> u32 {
        match self {
            OscSource::Main => crystal.hz,
            OscSource::PrecisionInternal => PIOSC_HZ,
            OscSource::PrecisionInternalDiv4 => PIOSC_HZ / 4,
            OscSource::LowFrequencyInternal => LFIOSC_HZ,
        }
    }
}

/// System clock selection, the RCC-level equivalent of
/// `SYSDIV_n | USE_PLL | XTAL_x | OSC_y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    pub crystal: Crystal,
    pub source: OscSource,
    pub use_pll: bool,
    /// Divisor applied after the PLL or oscillator: 3..=16 with the PLL,
    /// 1..=16 without. Values outside the range are clamped.
    pub sysdiv: u8,
}

impl ClockConfig {
    /// 16 MHz crystal through the PLL, divided by 5: 40 MHz.
    pub const DEFAULT: ClockConfig = ClockConfig {
        crystal: Crystal::MHZ_16,
        source: OscSource::Main,
        use_pll: true,
        sysdiv: 5,
    };

    /// `sysdiv` clamped to what RCC can encode for this source.
    pub const fn divisor(&self) -> u8 {
        let min = if self.use_pll { 3 } else { 1 };
        if self.sysdiv < min {
            min
        } else if self.sysdiv > 16 {
            16
        } else {
            self.sysdiv
        }
    }

    pub const fn frequency_hz(&self) -> u32 {
        let divisor = self.divisor() as u32;
        let base = if self.use_pll {
            PLL_HZ / 2
        } else {
            self.source.hz(self.crystal)
        };
        base / divisor
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Frequency selected by an RCC value, or `None` for a reserved crystal code.
pub fn rcc_frequency(rcc: u32) -> Option<u32> {
    let crystal = Crystal::from_code(((rcc & RCC_XTAL_MASK) >> RCC_XTAL_SHIFT) as u8)?;
    let source = OscSource::from_field((rcc & RCC_OSCSRC_MASK) >> RCC_OSCSRC_SHIFT);

    let pll_active = rcc & (RCC_BYPASS | RCC_PWRDN) == 0;
    let base = if pll_active {
        PLL_HZ / 2
    } else {
        source.hz(crystal)
    };

    if rcc & RCC_USESYSDIV != 0 {
        let sysdiv = (rcc & RCC_SYSDIV_MASK) >> RCC_SYSDIV_SHIFT;
        Some(base / (sysdiv + 1))
    } else {
        Some(base)
    }
}

/// Switch the system clock. Runs from the raw oscillator while the PLL
/// relocks, then drops the bypass.
pub fn clock_set<H: Hardware + ?Sized>(hw: &mut H, config: &ClockConfig) {
    let mut rcc = hw.read(SYSCTL_RCC);

    rcc |= RCC_BYPASS;
    rcc &= !RCC_USESYSDIV;
    hw.write(SYSCTL_RCC, rcc);

    rcc &= !(RCC_XTAL_MASK | RCC_OSCSRC_MASK | RCC_PWRDN | RCC_MOSCDIS);
    rcc |= (config.crystal.code() as u32) << RCC_XTAL_SHIFT;
    rcc |= config.source.field() << RCC_OSCSRC_SHIFT;
    if !config.use_pll {
        rcc |= RCC_PWRDN;
    }
    hw.write(SYSCTL_MISC, SYSCTL_PLLLRIS);
    hw.write(SYSCTL_RCC, rcc);

    rcc &= !RCC_SYSDIV_MASK;
    let divisor = config.divisor();
    if divisor > 1 {
        let field = (divisor - 1) as u32;
        rcc |= (field << RCC_SYSDIV_SHIFT) | RCC_USESYSDIV;
    }
    hw.write(SYSCTL_RCC, rcc);

    if config.use_pll {
        let mut polls = 0;
        while hw.read(SYSCTL_RIS) & SYSCTL_PLLLRIS == 0 && polls < PLL_LOCK_POLLS {
            polls += 1;
        }
        rcc &= !RCC_BYPASS;
        hw.write(SYSCTL_RCC, rcc);
    }
}

/// Current system clock, decoded from RCC. Zero if RCC holds a reserved
/// crystal code.
pub fn clock_get<H: Hardware + ?Sized>(hw: &H) -> u32 {
    rcc_frequency(hw.read(SYSCTL_RCC)).unwrap_or(0)
}

/// A run-mode clock gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockGate {
    Gpio(Port),
    Timer(TimerBlock),
}

impl ClockGate {
    /// (RCGC register, PR register, bit)
    const fn location(self) -> (u32, u32, u32) {
        match self {
            ClockGate::Gpio(port) => (SYSCTL_RCGCGPIO, SYSCTL_PRGPIO, 1 << port.index()),
            ClockGate::Timer(timer) => (SYSCTL_RCGCTIMER, SYSCTL_PRTIMER, 1 << timer.index()),
        }
    }
}

pub fn peripheral_enable<H: Hardware + ?Sized>(hw: &mut H, gate: ClockGate) {
    let (rcgc, _, bit) = gate.location();
    hw.set_bits(rcgc, bit);
}

pub fn peripheral_ready<H: Hardware + ?Sized>(hw: &H, gate: ClockGate) -> bool {
    let (_, pr, bit) = gate.location();
    hw.read(pr) & bit != 0
}

/// Enable a gate and spin until the block answers on the bus, giving up
/// after [`PERIPHERAL_READY_POLLS`]. Returns whether the block came up.
pub fn peripheral_enable_and_wait<H: Hardware + ?Sized>(hw: &mut H, gate: ClockGate) -> bool {
    peripheral_enable(hw, gate);
    let mut polls = 0;
    while !peripheral_ready(hw, gate) {
        if polls == PERIPHERAL_READY_POLLS {
            return false;
        }
        polls += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::fake::RecordingHardware;

    #[test]
    fn test_default_clock_is_40mhz() {
        assert_eq!(ClockConfig::DEFAULT.frequency_hz(), 40_000_000);
    }

    #[test]
    fn test_reset_rcc_decodes_to_piosc() {
        // Reset: PIOSC source, bypass, no sysdiv.
        assert_eq!(rcc_frequency(RCC_RESET), Some(PIOSC_HZ));
    }

    #[test]
    fn test_clock_set_writes_sysdiv_5_pll_16mhz() {
        let mut hw = RecordingHardware::new();
        clock_set(&mut hw, &ClockConfig::DEFAULT);

        let rcc = hw.regs[&SYSCTL_RCC];
        assert_eq!((rcc & RCC_XTAL_MASK) >> RCC_XTAL_SHIFT, 0x15);
        assert_eq!((rcc & RCC_SYSDIV_MASK) >> RCC_SYSDIV_SHIFT, 4);
        assert_eq!(rcc & RCC_OSCSRC_MASK, 0);
        assert_ne!(rcc & RCC_USESYSDIV, 0);
        assert_eq!(rcc & (RCC_BYPASS | RCC_PWRDN), 0);
        assert_eq!(clock_get(&hw), 40_000_000);
    }

    #[test]
    fn test_clock_set_keeps_bypass_until_last_write() {
        let mut hw = RecordingHardware::new();
        clock_set(&mut hw, &ClockConfig::DEFAULT);

        let writes = hw.writes_to(SYSCTL_RCC);
        let (last, earlier) = writes.split_last().unwrap();
        assert!(earlier.iter().all(|rcc| rcc & RCC_BYPASS != 0));
        assert_eq!(last & RCC_BYPASS, 0);
    }

    #[test]
    fn test_clock_without_pll() {
        let config = ClockConfig {
            use_pll: false,
            sysdiv: 1,
            ..ClockConfig::DEFAULT
        };
        let mut hw = RecordingHardware::new();
        clock_set(&mut hw, &config);
        assert_eq!(clock_get(&hw), 16_000_000);
        assert_eq!(config.frequency_hz(), 16_000_000);
    }

    #[test]
    fn test_crystal_table_lookup() {
        assert_eq!(Crystal::from_hz(16_000_000), Some(Crystal::MHZ_16));
        assert_eq!(Crystal::from_code(0x0E).map(Crystal::hz), Some(8_000_000));
        assert!(Crystal::from_hz(15_000_000).is_none());
        assert!(Crystal::from_code(0x05).is_none());
    }

    #[test]
    fn test_peripheral_enable_sets_gate_bits() {
        let mut hw = RecordingHardware::new();
        assert!(peripheral_enable_and_wait(&mut hw, ClockGate::Gpio(Port::F)));
        assert!(peripheral_enable_and_wait(&mut hw, ClockGate::Timer(TimerBlock::Timer0)));
        assert_eq!(hw.regs[&SYSCTL_RCGCGPIO], 1 << 5);
        assert_eq!(hw.regs[&SYSCTL_RCGCTIMER], 1 << 0);
    }

    /// PR registers that never report ready.
    struct DeadSysCtl(RecordingHardware);

    impl Hardware for DeadSysCtl {
        fn read(&self, addr: u32) -> u32 {
            match addr {
                SYSCTL_PRGPIO | SYSCTL_PRTIMER => 0,
                _ => self.0.read(addr),
            }
        }
        fn write(&mut self, addr: u32, value: u32) {
            self.0.write(addr, value)
        }
        fn enable_interrupts(&mut self) {}
        fn disable_interrupts(&mut self) {}
    }

    #[test]
    fn test_ready_wait_gives_up() {
        let mut hw = DeadSysCtl(RecordingHardware::new());
        assert!(!peripheral_enable_and_wait(&mut hw, ClockGate::Gpio(Port::F)));
        assert_eq!(hw.0.regs[&SYSCTL_RCGCGPIO], 1 << 5);
    }

    #[test]
    fn test_sysdiv_clamped_to_encodable_range() {
        let wrapped = ClockConfig {
            sysdiv: 17,
            ..ClockConfig::DEFAULT
        };
        assert_eq!(wrapped.divisor(), 16);
        let mut hw = RecordingHardware::new();
        clock_set(&mut hw, &wrapped);
        assert_eq!(clock_get(&hw), 12_500_000);
        assert_eq!(wrapped.frequency_hz(), clock_get(&hw));

        // SYSDIV /1 and /2 are reserved behind the PLL.
        let reserved = ClockConfig {
            sysdiv: 2,
            ..ClockConfig::DEFAULT
        };
        assert_eq!(reserved.divisor(), 3);
        let mut hw = RecordingHardware::new();
        clock_set(&mut hw, &reserved);
        assert_eq!((hw.regs[&SYSCTL_RCC] & RCC_SYSDIV_MASK) >> RCC_SYSDIV_SHIFT, 2);
        assert_eq!(reserved.frequency_hz(), clock_get(&hw));

        let raw = ClockConfig {
            use_pll: false,
            sysdiv: 0,
            ..ClockConfig::DEFAULT
        };
        assert_eq!(raw.divisor(), 1);
        assert_eq!(raw.frequency_hz(), 16_000_000);
    }
}
