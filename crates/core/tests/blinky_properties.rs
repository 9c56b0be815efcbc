// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::sync::{Arc, Mutex};
use tm4c_blinky::gpio::{Pins, Port};
use tm4c_blinky::regs::*;
use tm4c_blinky::timer::{self, TimerBlock, TimerInterrupts};
use tm4c_blinky::{BlinkConfig, Blinky, Hardware, InterruptHandler, Irq};
use tm4c_sim_core::bus::SystemBus;
use tm4c_sim_core::metrics::InterruptMetrics;
use tm4c_sim_core::signals::PinTrace;
use tm4c_sim_core::{Machine, SimulationObserver};

const CLOCK_HZ: u64 = 40_000_000;
const RELOAD: u64 = 1_999_999;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

fn pf_levels(machine: &Machine) -> u8 {
    machine
        .bus
        .gpio(Port::F)
        .map(|g| g.pin_levels())
        .unwrap_or(0)
}

/// Wraps the blinker with a second acknowledge of the time-out.
struct DoubleClear(Blinky);

impl InterruptHandler for DoubleClear {
    fn irq(&self) -> Irq {
        self.0.irq()
    }

    fn on_interrupt(&mut self, hw: &mut dyn Hardware) {
        let block = self.0.config().timer;
        timer::int_clear(hw, block, TimerInterrupts::TIMEOUT_A);
        self.0.on_timer_timeout(hw);
        timer::int_clear(hw, block, TimerInterrupts::TIMEOUT_A);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Write(u32, u32),
    MasterEnable(bool),
    Entry(Irq),
}

#[derive(Debug, Default)]
struct EventLog(Mutex<Vec<Event>>);

impl EventLog {
    fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }
}

impl SimulationObserver for EventLog {
    fn on_register_write(&self, _cycle: u64, addr: u32, value: u32) {
        self.push(Event::Write(addr, value));
    }
    fn on_master_enable(&self, _cycle: u64, enabled: bool) {
        self.push(Event::MasterEnable(enabled));
    }
    fn on_interrupt_entry(&self, _cycle: u64, irq: Irq) {
        self.push(Event::Entry(irq));
    }
}

#[test]
fn test_reload_value_for_default_board() {
    init_logging();
    assert_eq!(
        timer::reload_value(CLOCK_HZ as u32, 10),
        Some(RELOAD as u32)
    );

    let mut machine = Machine::new(SystemBus::new());
    let report = machine.boot(Blinky::default()).unwrap();
    assert_eq!(report.clock_hz, CLOCK_HZ as u32);
    assert_eq!(report.reload, RELOAD as u32);
    assert_eq!(
        machine.bus.read_u32(TIMER0_BASE + GPTM_TAILR).unwrap(),
        RELOAD as u32
    );
}

#[test]
fn test_double_clear_causes_no_extra_invocation() {
    init_logging();
    let mut machine = Machine::new(SystemBus::new());
    let metrics = Arc::new(InterruptMetrics::new());
    machine.add_observer(metrics.clone());

    let blinky = Blinky::default();
    machine.boot(blinky).unwrap();
    let previous = machine.vectors.register(Box::new(DoubleClear(blinky)));
    assert!(previous.is_some());

    machine.run_cycles(RELOAD + 5 * (RELOAD + 1)).unwrap();

    let timeouts = machine.bus.timer(TimerBlock::Timer0).unwrap().timeouts();
    assert_eq!(timeouts, 6);
    assert_eq!(metrics.dispatch_count(Irq::TIMER0A), timeouts);
    assert!(!machine.bus.nvic.is_pending(Irq::TIMER0A));
}

#[test]
fn test_each_invocation_follows_the_toggle_rule() {
    init_logging();
    let mut machine = Machine::new(SystemBus::new());
    machine.boot(Blinky::default()).unwrap();

    // Give PF1/PF3 a stale high level so the asymmetry shows up.
    machine
        .execute("setup", |hw| {
            tm4c_blinky::gpio::pin_write(hw, Port::F, Pins::PIN_1 | Pins::PIN_3, Pins::all())
        })
        .unwrap();

    let mut step = RELOAD;
    for _ in 0..8 {
        let before = pf_levels(&machine);
        machine.run_cycles(step).unwrap();
        let after = pf_levels(&machine);

        if before & 0x04 != 0 {
            assert_eq!(after & 0x0E, 0, "PF2 was high: all outputs go low");
        } else {
            assert_eq!(after & 0x04, 0x04, "PF2 was low: PF2 goes high");
            assert_eq!(after & 0x0A, before & 0x0A, "PF1/PF3 untouched");
        }
        step = RELOAD + 1;
    }
}

#[test]
fn test_no_invocation_before_master_enable() {
    init_logging();
    let mut machine = Machine::new(SystemBus::new());
    let log = Arc::new(EventLog::default());
    let metrics = Arc::new(InterruptMetrics::new());
    machine.add_observer(log.clone());
    machine.add_observer(metrics.clone());

    machine.boot(Blinky::default()).unwrap();
    machine.run_cycles(4 * (RELOAD + 1)).unwrap();

    let events = log.events();
    let unmask = events
        .iter()
        .position(|e| *e == Event::MasterEnable(true))
        .unwrap();
    let first_entry = events
        .iter()
        .position(|e| matches!(e, Event::Entry(_)))
        .unwrap();
    let start = events
        .iter()
        .position(|e| *e == Event::Write(TIMER0_BASE + GPTM_CTL, GPTM_CTL_TAEN))
        .unwrap();

    assert_eq!(events[0], Event::MasterEnable(false));
    assert!(unmask < start, "timer starts after the master enable");
    assert!(start < first_entry);
    assert_eq!(metrics.dispatches_while_masked(), 0);
    assert!(metrics.first_dispatch_cycle() >= metrics.master_enable_cycle());
}

#[test]
fn test_pf2_blinks_at_ten_hertz_with_even_duty() {
    init_logging();
    let mut machine = Machine::new(SystemBus::new());
    let trace = Arc::new(PinTrace::new());
    machine.add_observer(trace.clone());

    machine.boot(Blinky::default()).unwrap();
    machine.run_for(std::time::Duration::from_secs(1)).unwrap();

    let stats = trace.stats(Port::F, 2, machine.clock_hz());
    assert_eq!(stats.rising_edges, 10);
    assert_eq!(stats.falling_edges, 10);
    assert_eq!(stats.period_cycles, Some(4_000_000.0));
    assert_eq!(stats.high_cycles, Some(2_000_000.0));
    assert_eq!(stats.frequency_hz, Some(10.0));
    assert_eq!(stats.duty_percent, Some(50.0));

    // PF1 and PF3 are only ever driven low.
    assert!(trace.events_for(Port::F, 1).is_empty());
    assert!(trace.events_for(Port::F, 3).is_empty());
}

#[test]
fn test_slower_toggle_rate_scales_period() {
    init_logging();
    let config = BlinkConfig {
        toggle_hz: 5,
        ..BlinkConfig::DEFAULT
    };
    let mut machine = Machine::new(SystemBus::new());
    let trace = Arc::new(PinTrace::new());
    machine.add_observer(trace.clone());

    let report = machine.boot(Blinky::new(config)).unwrap();
    assert_eq!(report.reload, 3_999_999);
    machine.run_for(std::time::Duration::from_secs(2)).unwrap();

    let stats = trace.stats(Port::F, 2, machine.clock_hz());
    assert_eq!(stats.period_cycles, Some(8_000_000.0));
    assert_eq!(stats.frequency_hz, Some(5.0));
}
