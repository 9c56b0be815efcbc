// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tm4c_blinky::Irq;
use tm4c_sim_config::{parse_pin, StopReason, TestAssertion, TestLimits};
use tm4c_sim_core::metrics::{InterruptMetrics, InterruptSummary};
use tm4c_sim_core::signals::{PinTrace, WaveformStats};
use tm4c_sim_core::snapshot::MachineSnapshot;
use tm4c_sim_core::{Machine, SimulationError};
use tracing::error;

pub const RESULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Serialize)]
pub struct TestResult {
    pub result_schema_version: String,
    pub status: String,
    pub cycles: u64,
    pub simulated_ms: f64,
    pub clock_hz: u32,
    pub stop_reason: StopReason,
    pub stop_reason_details: StopReasonDetails,
    pub limits: TestLimits,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub assertions: Vec<AssertionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupts: Option<InterruptSummary>,
    pub config: TestConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StopReasonDetails {
    pub triggered_stop_condition: StopReason,
    pub triggered_limit: Option<NamedU64>,
    pub observed: Option<NamedU64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NamedU64 {
    pub name: String,
    pub value: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AssertionResult {
    pub assertion: TestAssertion,
    pub passed: bool,
    /// What the run actually produced, for failed-assertion triage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TestConfig {
    pub system: Option<PathBuf>,
    pub script: PathBuf,
}

/// Everything the assertions look at once the run is over.
pub struct RunOutcome<'a> {
    pub machine: &'a Machine,
    pub trace: &'a PinTrace,
    pub metrics: &'a InterruptMetrics,
    pub stop_reason: StopReason,
}

pub fn stop_reason_for(err: &SimulationError) -> StopReason {
    match err.root() {
        SimulationError::MemoryViolation(_) | SimulationError::UnalignedAccess(_) => {
            StopReason::MemoryViolation
        }
        SimulationError::PeripheralNotClocked { .. } | SimulationError::BusFault { .. } => {
            StopReason::BusFault
        }
        SimulationError::UnhandledInterrupt(_) => StopReason::UnhandledInterrupt,
        SimulationError::InterruptStorm { .. } => StopReason::InterruptStorm,
    }
}

pub fn evaluate(assertion: &TestAssertion, outcome: &RunOutcome<'_>) -> AssertionResult {
    let (passed, observed) = match assertion {
        TestAssertion::PinFrequency(a) => {
            let a = &a.pin_frequency;
            match pin_stats(&a.pin, outcome) {
                Some(stats) => {
                    let hz = stats.frequency_hz;
                    let passed = hz.is_some_and(|f| (f - a.hz).abs() <= a.tolerance * a.hz);
                    (passed, Some(serde_json::json!({ "hz": hz })))
                }
                None => (false, None),
            }
        }
        TestAssertion::DutyCycle(a) => {
            let a = &a.duty_cycle;
            match pin_stats(&a.pin, outcome) {
                Some(stats) => {
                    let duty = stats.duty_percent;
                    let passed = duty.is_some_and(|d| (d - a.percent).abs() <= a.tolerance);
                    (passed, Some(serde_json::json!({ "percent": duty })))
                }
                None => (false, None),
            }
        }
        TestAssertion::InterruptCount(a) => {
            let a = &a.interrupt_count;
            let count = Irq::new(a.irq)
                .map(|irq| outcome.metrics.dispatch_count(irq))
                .unwrap_or(0);
            let passed = a.min.map_or(true, |min| count >= min)
                && a.max.map_or(true, |max| count <= max);
            (passed, Some(serde_json::json!({ "count": count })))
        }
        TestAssertion::RegisterValue(a) => {
            let a = &a.register_value;
            let mask = a.mask.unwrap_or(u32::MAX);
            match outcome.machine.bus.read_u32(a.address) {
                Ok(value) => (
                    value & mask == a.expected & mask,
                    Some(serde_json::json!({ "value": value })),
                ),
                Err(e) => (false, Some(serde_json::json!({ "error": e.to_string() }))),
            }
        }
        TestAssertion::ExpectedStopReason(a) => (
            a.expected_stop_reason == outcome.stop_reason,
            Some(serde_json::json!({ "stop_reason": outcome.stop_reason })),
        ),
    };

    if !passed {
        error!("Assertion failed: {:?} (observed {:?})", assertion, observed);
    }

    AssertionResult {
        assertion: assertion.clone(),
        passed,
        observed,
    }
}

fn pin_stats(name: &str, outcome: &RunOutcome<'_>) -> Option<WaveformStats> {
    let (port, pin) = parse_pin(name).ok()?;
    Some(outcome.trace.stats(port, pin, outcome.machine.clock_hz()))
}

pub fn build_stop_reason_details(
    stop_reason: StopReason,
    limits: &TestLimits,
    cycles: u64,
    simulated_ms: u64,
    wall: std::time::Duration,
) -> StopReasonDetails {
    let named = |name: &str, value: u64| NamedU64 {
        name: name.to_string(),
        value,
    };
    let (triggered_limit, observed) = match stop_reason {
        StopReason::Duration => (
            limits.duration_ms.map(|v| named("duration_ms", v)),
            Some(named("simulated_ms", simulated_ms)),
        ),
        StopReason::MaxCycles => (
            limits.max_cycles.map(|v| named("max_cycles", v)),
            Some(named("cycles", cycles)),
        ),
        StopReason::WallTime => (
            limits.wall_time_ms.map(|v| named("wall_time_ms", v)),
            Some(named(
                "elapsed_wall_time_ms",
                wall.as_millis().min(u128::from(u64::MAX)) as u64,
            )),
        ),
        StopReason::ConfigError
        | StopReason::BusFault
        | StopReason::MemoryViolation
        | StopReason::UnhandledInterrupt
        | StopReason::InterruptStorm => (None, None),
    };

    StopReasonDetails {
        triggered_stop_condition: stop_reason,
        triggered_limit,
        observed,
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) {
    match std::fs::File::create(path) {
        Ok(f) => {
            if let Err(e) = serde_json::to_writer_pretty(f, value) {
                error!("Failed to write {:?}: {}", path, e);
            }
        }
        Err(e) => error!("Failed to create {:?}: {}", path, e),
    }
}

/// Best effort: `result.json`, plus `snapshot.json` when a machine exists.
pub fn write_outputs(output_dir: &Path, result: &TestResult, snapshot: Option<&MachineSnapshot>) {
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!("Failed to create output directory {:?}: {}", output_dir, e);
        return;
    }
    write_json(&output_dir.join("result.json"), result);
    if let Some(snapshot) = snapshot {
        write_json(&output_dir.join("snapshot.json"), snapshot);
    }
}

pub fn resolve_script_path(script_path: &Path, value: &str) -> PathBuf {
    let p = PathBuf::from(value);
    if p.is_absolute() {
        return p;
    }
    script_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(p)
}
