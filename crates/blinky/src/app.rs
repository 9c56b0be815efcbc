// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! The blinker itself: one-shot bring-up and the timer time-out routine.

use crate::gpio::{self, Pins, Port};
use crate::hw::{Hardware, InterruptHandler};
use crate::nvic::{self, Irq};
use crate::sysctl::{self, ClockConfig, ClockGate};
use crate::timer::{self, Mode, TimerBlock, TimerInterrupts};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkConfig {
    pub clock: ClockConfig,
    /// Output toggle rate; the timer fires at twice this.
    pub toggle_hz: u32,
    pub timer: TimerBlock,
    pub port: Port,
    /// Pins configured as outputs and cleared together on the off phase.
    pub outputs: Pins,
    /// Pin whose level selects the next phase.
    pub monitor: Pins,
    /// Pins raised on the on phase.
    pub drive: Pins,
}

impl BlinkConfig {
    /// EK-TM4C123GXL: RGB LED on PF1-PF3, blue (PF2) blinking at 10 Hz
    /// from Timer0A at 40 MHz.
    pub const DEFAULT: BlinkConfig = BlinkConfig {
        clock: ClockConfig::DEFAULT,
        toggle_hz: 10,
        timer: TimerBlock::Timer0,
        port: Port::F,
        outputs: Pins::PIN_1.union(Pins::PIN_2).union(Pins::PIN_3),
        monitor: Pins::PIN_2,
        drive: Pins::PIN_2,
    };

    /// Reload computed from the configured clock rather than the registers.
    pub const fn reload(&self) -> Option<u32> {
        timer::reload_value(self.clock.frequency_hz(), self.toggle_hz)
    }
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Output state written by one time-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPhase {
    /// Every output pin low.
    AllOff,
    /// Only the drive pins raised; other outputs keep their level.
    IndicatorOn,
}

impl OutputPhase {
    pub const fn after(monitor_high: bool) -> OutputPhase {
        if monitor_high {
            OutputPhase::AllOff
        } else {
            OutputPhase::IndicatorOn
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    /// System clock as decoded from RCC after the switch.
    pub clock_hz: u32,
    pub reload: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blinky {
    config: BlinkConfig,
}

impl Blinky {
    pub const fn new(config: BlinkConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &BlinkConfig {
        &self.config
    }

    /// Everything up to, not including, the master enable. Interrupts are
    /// masked on entry so nothing can fire mid-configuration.
    pub fn configure<H: Hardware + ?Sized>(&self, hw: &mut H) -> InitReport {
        let cfg = &self.config;
        hw.disable_interrupts();

        sysctl::clock_set(hw, &cfg.clock);

        sysctl::peripheral_enable_and_wait(hw, ClockGate::Gpio(cfg.port));
        gpio::pin_type_output(hw, cfg.port, cfg.outputs);

        sysctl::peripheral_enable_and_wait(hw, ClockGate::Timer(cfg.timer));
        timer::configure(hw, cfg.timer, Mode::Periodic);

        let clock_hz = sysctl::clock_get(hw);
        // A rate the clock cannot reach degrades to the slowest blink.
        let reload = timer::reload_value(clock_hz, cfg.toggle_hz).unwrap_or(u32::MAX);
        timer::load_set(hw, cfg.timer, reload);

        nvic::enable_irq(hw, cfg.timer.irq_a());
        timer::int_enable(hw, cfg.timer, TimerInterrupts::TIMEOUT_A);

        InitReport { clock_hz, reload }
    }

    /// Master enable, then start counting.
    pub fn start<H: Hardware + ?Sized>(&self, hw: &mut H) {
        hw.enable_interrupts();
        timer::enable(hw, self.config.timer);
    }

    pub fn init<H: Hardware + ?Sized>(&self, hw: &mut H) -> InitReport {
        let report = self.configure(hw);
        self.start(hw);
        report
    }

    pub fn on_timer_timeout<H: Hardware + ?Sized>(&self, hw: &mut H) -> OutputPhase {
        let cfg = &self.config;
        timer::int_clear(hw, cfg.timer, TimerInterrupts::TIMEOUT_A);

        let high = !gpio::pin_read(hw, cfg.port, cfg.monitor).is_empty();
        let phase = OutputPhase::after(high);
        match phase {
            OutputPhase::AllOff => gpio::pin_write(hw, cfg.port, cfg.outputs, Pins::empty()),
            OutputPhase::IndicatorOn => gpio::pin_write(hw, cfg.port, cfg.drive, cfg.drive),
        }
        phase
    }
}

impl Default for Blinky {
    fn default() -> Self {
        Self::new(BlinkConfig::DEFAULT)
    }
}

impl InterruptHandler for Blinky {
    fn irq(&self) -> Irq {
        self.config.timer.irq_a()
    }

    fn on_interrupt(&mut self, hw: &mut dyn Hardware) {
        self.on_timer_timeout(hw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::fake::{Access, RecordingHardware};
    use crate::regs::*;

    const T0: u32 = TIMER0_BASE;

    #[test]
    fn test_default_config_values() {
        let cfg = BlinkConfig::DEFAULT;
        assert_eq!(cfg.outputs.bits(), 0x0E);
        assert_eq!(cfg.clock.frequency_hz(), 40_000_000);
        assert_eq!(cfg.reload(), Some(1_999_999));
    }

    #[test]
    fn test_init_reports_reload_from_rcc() {
        let mut hw = RecordingHardware::new();
        let report = Blinky::default().init(&mut hw);
        assert_eq!(
            report,
            InitReport {
                clock_hz: 40_000_000,
                reload: 1_999_999
            }
        );
        assert_eq!(hw.regs[&(T0 + GPTM_TAILR)], 1_999_999);
        assert_eq!(hw.regs[&(T0 + GPTM_TAMR)], GPTM_TAMR_PERIODIC);
        assert_eq!(hw.regs[&(T0 + GPTM_IMR)], 1);
        assert_eq!(hw.regs[&NVIC_EN0], 1 << 19);
    }

    #[test]
    fn test_init_masks_first_and_unmasks_before_timer_start() {
        let mut hw = RecordingHardware::new();
        Blinky::default().init(&mut hw);

        assert_eq!(hw.log.first(), Some(&Access::MasterDisable));

        let unmask = hw.position(Access::MasterEnable).unwrap();
        let start = hw
            .position(Access::Write(T0 + GPTM_CTL, GPTM_CTL_TAEN))
            .unwrap();
        assert_eq!(start, unmask + 1);
        assert_eq!(start, hw.log.len() - 1);

        // Every setup write lands before the unmask.
        for reg in [SYSCTL_RCC, T0 + GPTM_TAILR, T0 + GPTM_IMR, NVIC_EN0] {
            assert!(hw.position_of_write(reg).unwrap() < unmask);
        }
    }

    #[test]
    fn test_configure_leaves_interrupts_masked() {
        let mut hw = RecordingHardware::new();
        Blinky::default().configure(&mut hw);
        assert!(hw.position(Access::MasterEnable).is_none());
        assert_eq!(hw.regs.get(&(T0 + GPTM_CTL)).copied().unwrap_or(0), 0);
    }

    #[test]
    fn test_timeout_with_monitor_high_clears_all() {
        let mut hw = RecordingHardware::new();
        hw.regs.insert(Port::F.data_addr(Pins::PIN_2), 0x04);

        let phase = Blinky::default().on_timer_timeout(&mut hw);

        assert_eq!(phase, OutputPhase::AllOff);
        let all = Port::F.data_addr(Pins::PIN_1 | Pins::PIN_2 | Pins::PIN_3);
        assert_eq!(hw.writes_to(all), vec![0]);
    }

    #[test]
    fn test_timeout_with_monitor_low_raises_only_pf2() {
        let mut hw = RecordingHardware::new();

        let phase = Blinky::default().on_timer_timeout(&mut hw);

        assert_eq!(phase, OutputPhase::IndicatorOn);
        assert_eq!(hw.writes_to(Port::F.data_addr(Pins::PIN_2)), vec![0x04]);
        let all = Port::F.data_addr(Pins::PIN_1 | Pins::PIN_2 | Pins::PIN_3);
        assert!(hw.writes_to(all).is_empty());
    }

    #[test]
    fn test_timeout_acknowledges_before_reading_pin() {
        let mut hw = RecordingHardware::new();
        Blinky::default().on_timer_timeout(&mut hw);
        assert_eq!(hw.log.first(), Some(&Access::Write(T0 + GPTM_ICR, 1)));
    }

    #[test]
    fn test_reload_fallback_when_unreachable() {
        let cfg = BlinkConfig {
            toggle_hz: 0,
            ..BlinkConfig::DEFAULT
        };
        let mut hw = RecordingHardware::new();
        let report = Blinky::new(cfg).configure(&mut hw);
        assert_eq!(report.reload, u32::MAX);
        assert_eq!(cfg.reload(), None);
    }

    #[test]
    fn test_phase_function() {
        assert_eq!(OutputPhase::after(true), OutputPhase::AllOff);
        assert_eq!(OutputPhase::after(false), OutputPhase::IndicatorOn);
    }

    #[test]
    fn test_handler_binding() {
        let mut blinky = Blinky::default();
        assert_eq!(blinky.irq(), Irq::TIMER0A);
        let mut hw = RecordingHardware::new();
        blinky.on_interrupt(&mut hw);
        assert_eq!(hw.writes_to(T0 + GPTM_ICR), vec![1]);
    }
}
