// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tm4c_blinky::gpio::{Pins, Port};
use tm4c_blinky::sysctl::{ClockConfig, Crystal, OscSource};
use tm4c_blinky::timer::{self, TimerBlock};
use tm4c_blinky::BlinkConfig;

pub const SCHEMA_VERSION: &str = "1.0";

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Oscillator {
    #[default]
    #[serde(alias = "mosc")]
    Main,
    Piosc,
    PioscDiv4,
    Lfiosc,
}

impl From<Oscillator> for OscSource {
    fn from(osc: Oscillator) -> Self {
        match osc {
            Oscillator::Main => OscSource::Main,
            Oscillator::Piosc => OscSource::PrecisionInternal,
            Oscillator::PioscDiv4 => OscSource::PrecisionInternalDiv4,
            Oscillator::Lfiosc => OscSource::LowFrequencyInternal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockSection {
    pub crystal_hz: u32,
    pub sysdiv: u8,
    pub use_pll: bool,
    pub oscillator: Oscillator,
}

impl Default for ClockSection {
    fn default() -> Self {
        Self {
            crystal_hz: 16_000_000,
            sysdiv: 5,
            use_pll: true,
            oscillator: Oscillator::Main,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlinkSection {
    pub toggle_hz: u32,
    pub port: String,
    pub pins: Vec<u8>,
    pub monitor_pin: u8,
    /// Pins raised on the on phase. Defaults to the monitor pin.
    pub drive_pins: Option<Vec<u8>>,
}

impl Default for BlinkSection {
    fn default() -> Self {
        Self {
            toggle_hz: 10,
            port: "F".to_string(),
            pins: vec![1, 2, 3],
            monitor_pin: 2,
            drive_pins: None,
        }
    }
}

/// Board description: clock tree, LED wiring and which timer drives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default = "default_board_name")]
    pub name: String,
    #[serde(default)]
    pub clock: ClockSection,
    #[serde(default)]
    pub blink: BlinkSection,
    /// Timer block number, 0..=5.
    #[serde(default)]
    pub timer: u8,
}

fn default_board_name() -> String {
    "ek-tm4c123gxl".to_string()
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            name: default_board_name(),
            clock: ClockSection::default(),
            blink: BlinkSection::default(),
            timer: 0,
        }
    }
}

impl BoardConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read board config at {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid board config {:?}", path))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let board: Self = serde_yaml::from_str(yaml).context("Failed to parse Board Config YAML")?;
        board.validate()?;
        Ok(board)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '{}'",
                self.schema_version,
                SCHEMA_VERSION
            );
        }

        let clock = &self.clock;
        if Crystal::from_hz(clock.crystal_hz).is_none() {
            anyhow::bail!("Unsupported crystal frequency {} Hz", clock.crystal_hz);
        }
        let sysdiv_range = if clock.use_pll { 3..=16 } else { 1..=16 };
        if !sysdiv_range.contains(&clock.sysdiv) {
            anyhow::bail!(
                "sysdiv {} out of range {:?} (use_pll: {})",
                clock.sysdiv,
                sysdiv_range,
                clock.use_pll
            );
        }

        if TimerBlock::from_index(self.timer as u32).is_none() {
            anyhow::bail!("Timer block {} does not exist (0..=5)", self.timer);
        }

        let blink = &self.blink;
        let port = self.port()?;
        if blink.toggle_hz == 0 {
            anyhow::bail!("Field 'toggle_hz' must be greater than zero");
        }
        let clock_hz = self.clock_config().frequency_hz();
        if timer::reload_value(clock_hz, blink.toggle_hz).is_none() {
            anyhow::bail!(
                "toggle_hz {} is unreachable from a {} Hz clock",
                blink.toggle_hz,
                clock_hz
            );
        }

        if blink.pins.is_empty() {
            anyhow::bail!("Field 'pins' must list at least one output pin");
        }
        let outputs = pin_set(&blink.pins)?;
        let monitor = pin_set(&[blink.monitor_pin])?;
        if !outputs.contains(monitor) {
            anyhow::bail!(
                "monitor_pin {} is not among the output pins {:?}",
                blink.monitor_pin,
                blink.pins
            );
        }
        if let Some(drive) = &blink.drive_pins {
            let drive = pin_set(drive)?;
            if drive.is_empty() || !outputs.contains(drive) {
                anyhow::bail!("drive_pins must be a non-empty subset of the output pins");
            }
        }

        // PF0 and PD7 sit behind GPIOLOCK; PC0-PC3 carry JTAG.
        let locked = match port {
            Port::F => Pins::PIN_0,
            Port::D => Pins::PIN_7,
            Port::C => Pins::PIN_0 | Pins::PIN_1 | Pins::PIN_2 | Pins::PIN_3,
            _ => Pins::empty(),
        };
        if outputs.intersects(locked) {
            tracing::warn!(
                "Board '{}' drives locked/JTAG pins {:?} on port {}; real silicon needs an unlock first",
                self.name,
                outputs & locked,
                port.name()
            );
        }

        Ok(())
    }

    pub fn port(&self) -> Result<Port> {
        let mut chars = self.blink.port.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Port::from_name(c)
                .ok_or_else(|| anyhow::anyhow!("Unknown GPIO port '{}'", self.blink.port)),
            _ => anyhow::bail!(
                "GPIO port must be a single letter A-F, got '{}'",
                self.blink.port
            ),
        }
    }

    pub fn clock_config(&self) -> ClockConfig {
        ClockConfig {
            // validate() guarantees a table entry; fall back for unvalidated input.
            crystal: Crystal::from_hz(self.clock.crystal_hz).unwrap_or(Crystal::MHZ_16),
            source: self.clock.oscillator.into(),
            use_pll: self.clock.use_pll,
            sysdiv: self.clock.sysdiv,
        }
    }

    /// Validated firmware configuration for this board.
    pub fn blink_config(&self) -> Result<BlinkConfig> {
        self.validate()?;
        let blink = &self.blink;
        let monitor = pin_set(&[blink.monitor_pin])?;
        let drive = match &blink.drive_pins {
            Some(pins) => pin_set(pins)?,
            None => monitor,
        };
        let timer = TimerBlock::from_index(self.timer as u32)
            .ok_or_else(|| anyhow::anyhow!("Timer block {} does not exist", self.timer))?;

        Ok(BlinkConfig {
            clock: self.clock_config(),
            toggle_hz: blink.toggle_hz,
            timer,
            port: self.port()?,
            outputs: pin_set(&blink.pins)?,
            monitor,
            drive,
        })
    }
}

/// Board file at `path`, or the default EK-TM4C123GXL board.
pub fn load_board(path: Option<&Path>) -> Result<BoardConfig> {
    match path {
        Some(path) => {
            tracing::info!("Loading board config: {:?}", path);
            BoardConfig::from_file(path)
        }
        None => {
            tracing::info!("Using default board configuration");
            Ok(BoardConfig::default())
        }
    }
}

fn pin_set(pins: &[u8]) -> Result<Pins> {
    pins.iter().try_fold(Pins::empty(), |acc, &n| {
        Pins::pin(n)
            .map(|p| acc | p)
            .ok_or_else(|| anyhow::anyhow!("Pin number {} out of range 0..=7", n))
    })
}

/// Parse a pin name such as `PF2` (the `P` is optional).
pub fn parse_pin(name: &str) -> Result<(Port, u8)> {
    let trimmed = name.trim();
    let upper = trimmed.to_ascii_uppercase();
    let rest = upper.strip_prefix('P').unwrap_or(&upper);
    let mut chars = rest.chars();
    let port = chars
        .next()
        .and_then(Port::from_name)
        .ok_or_else(|| anyhow::anyhow!("Invalid pin name '{}'", trimmed))?;
    let pin: u8 = chars
        .as_str()
        .parse()
        .with_context(|| format!("Invalid pin number in '{}'", trimmed))?;
    if pin > 7 {
        anyhow::bail!("Pin number {} out of range in '{}'", pin, trimmed);
    }
    Ok((port, pin))
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct TestInputs {
    #[serde(default)]
    pub system: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct TestLimits {
    /// Simulated time budget.
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub max_cycles: Option<u64>,
    #[serde(default)]
    pub wall_time_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Runner failed before simulation started (e.g. script parse/validation error).
    ConfigError,
    Duration,
    MaxCycles,
    WallTime,
    BusFault,
    MemoryViolation,
    UnhandledInterrupt,
    InterruptStorm,
}

fn default_frequency_tolerance() -> f64 {
    0.01
}

fn default_duty_tolerance() -> f64 {
    1.0
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PinFrequencyDetails {
    pub pin: String,
    pub hz: f64,
    /// Relative error allowed, 0.01 = 1%.
    #[serde(default = "default_frequency_tolerance")]
    pub tolerance: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PinFrequencyAssertion {
    pub pin_frequency: PinFrequencyDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DutyCycleDetails {
    pub pin: String,
    pub percent: f64,
    /// Allowed error in percentage points.
    #[serde(default = "default_duty_tolerance")]
    pub tolerance: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DutyCycleAssertion {
    pub duty_cycle: DutyCycleDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct InterruptCountDetails {
    pub irq: u16,
    #[serde(default)]
    pub min: Option<u64>,
    #[serde(default)]
    pub max: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct InterruptCountAssertion {
    pub interrupt_count: InterruptCountDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RegisterValueDetails {
    pub address: u32,
    pub expected: u32,
    #[serde(default)]
    pub mask: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RegisterValueAssertion {
    pub register_value: RegisterValueDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TestAssertion {
    PinFrequency(PinFrequencyAssertion),
    DutyCycle(DutyCycleAssertion),
    InterruptCount(InterruptCountAssertion),
    RegisterValue(RegisterValueAssertion),
    ExpectedStopReason(StopReasonAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestScript {
    pub schema_version: String,
    #[serde(default)]
    pub inputs: TestInputs,
    pub limits: TestLimits,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

impl TestScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read test script at {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let script: Self = serde_yaml::from_str(yaml).context("Failed to parse Test Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '{}'",
                self.schema_version,
                SCHEMA_VERSION
            );
        }

        let limits = &self.limits;
        if limits.duration_ms.is_none() && limits.max_cycles.is_none() {
            anyhow::bail!("Limits must set 'duration_ms' or 'max_cycles'");
        }
        if limits.duration_ms == Some(0) {
            anyhow::bail!("Limit 'duration_ms' must be greater than zero");
        }
        if limits.max_cycles == Some(0) {
            anyhow::bail!("Limit 'max_cycles' must be greater than zero");
        }
        if limits.wall_time_ms == Some(0) {
            anyhow::bail!("Limit 'wall_time_ms' must be greater than zero");
        }

        if let Some(system) = &self.inputs.system {
            if system.trim().is_empty() {
                anyhow::bail!("Input 'system' path cannot be empty");
            }
        }

        for assertion in &self.assertions {
            match assertion {
                TestAssertion::PinFrequency(a) => {
                    parse_pin(&a.pin_frequency.pin)?;
                    if a.pin_frequency.hz <= 0.0 {
                        anyhow::bail!("pin_frequency 'hz' must be positive");
                    }
                }
                TestAssertion::DutyCycle(a) => {
                    parse_pin(&a.duty_cycle.pin)?;
                    if !(0.0..=100.0).contains(&a.duty_cycle.percent) {
                        anyhow::bail!("duty_cycle 'percent' must be within 0..=100");
                    }
                }
                TestAssertion::InterruptCount(a) => {
                    let c = &a.interrupt_count;
                    if let (Some(min), Some(max)) = (c.min, c.max) {
                        if min > max {
                            anyhow::bail!("interrupt_count min {} exceeds max {}", min, max);
                        }
                    }
                }
                TestAssertion::RegisterValue(_) | TestAssertion::ExpectedStopReason(_) => {}
            }
        }

        Ok(())
    }
}
