// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod runner;
mod vcd_trace;

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

use runner::{
    build_stop_reason_details, evaluate, resolve_script_path, stop_reason_for, write_outputs,
    RunOutcome, TestConfig, TestResult, RESULT_SCHEMA_VERSION,
};
use tm4c_blinky::gpio::Port;
use tm4c_sim_config::{load_board, BoardConfig, StopReason, TestLimits, TestScript};
use tm4c_sim_core::metrics::InterruptMetrics;
use tm4c_sim_core::signals::PinTrace;
use tm4c_sim_core::{system, Machine, SimulationError};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "TM4C123 timer-interrupt blinky simulator",
    long_about = None
)]
struct Cli {
    /// Path to the board description (YAML). Defaults to the EK-TM4C123GXL.
    #[arg(short, long, global = true)]
    system: Option<PathBuf>,

    /// Simulated time to run for, in milliseconds
    #[arg(long, default_value = "1000")]
    duration_ms: u64,

    /// Write the output pins as a VCD waveform
    #[arg(long)]
    vcd: Option<PathBuf>,

    /// Print a machine-readable report line on stdout
    #[arg(long)]
    json: bool,

    /// Write a state snapshot (JSON) after the run
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Log register writes and interrupt dispatch
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the clock frequency and timer reload value for a board.
    Reload(ReloadArgs),

    /// Deterministic, CI-friendly runner mode driven by a test script (YAML).
    Test(TestArgs),
}

#[derive(Parser, Debug)]
struct ReloadArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct TestArgs {
    /// Path to the test script (YAML)
    #[arg(short = 'c', long)]
    script: PathBuf,

    /// Directory to write test artifacts (result.json, snapshot.json)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Override max cycles limit
    #[arg(long)]
    max_cycles: Option<u64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Reload(ref args)) => run_reload(cli.system.as_deref(), args),
        Some(Commands::Test(ref args)) => run_test(args, cli.system.clone()),
        None => run_interactive(&cli),
    }
}

fn board_pins(board: &BoardConfig) -> anyhow::Result<Vec<(Port, u8)>> {
    let port = board.port()?;
    Ok(board.blink.pins.iter().map(|&pin| (port, pin)).collect())
}

fn run_reload(system: Option<&Path>, args: &ReloadArgs) -> ExitCode {
    let config = match load_board(system).and_then(|b| b.blink_config()) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let clock_hz = config.clock.frequency_hz();
    let Some(reload) = config.reload() else {
        error!(
            "toggle_hz {} is unreachable from a {} Hz clock",
            config.toggle_hz, clock_hz
        );
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };

    if args.json {
        let report = serde_json::json!({
            "clock_hz": clock_hz,
            "toggle_hz": config.toggle_hz,
            "reload": reload,
        });
        println!("{}", report);
    } else {
        println!("clock_hz: {}", clock_hz);
        println!("toggle_hz: {}", config.toggle_hz);
        println!("reload: {}", reload);
    }
    ExitCode::from(EXIT_PASS)
}

fn run_interactive(cli: &Cli) -> ExitCode {
    info!("Starting TM4C123 blinky simulation");

    let board = match load_board(cli.system.as_deref()) {
        Ok(board) => board,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let (pins, (mut machine, blinky)) =
        match board_pins(&board).and_then(|pins| Ok((pins, system::build_from_board(&board)?))) {
            Ok(built) => built,
            Err(e) => {
                error!("{:#}", e);
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        };

    let trace = Arc::new(PinTrace::new());
    let metrics = Arc::new(InterruptMetrics::new());
    machine.add_observer(trace.clone());
    machine.add_observer(metrics.clone());

    if let Some(path) = &cli.vcd {
        let clock_hz = board.clock_config().frequency_hz();
        match vcd_trace::VcdObserver::new(path, &pins, clock_hz) {
            Ok(vcd) => {
                info!("Writing VCD trace to {:?}", path);
                machine.add_observer(Arc::new(vcd));
            }
            Err(e) => {
                error!("Failed to create VCD file {:?}: {:#}", path, e);
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        }
    }

    let report = match machine.boot(blinky) {
        Ok(report) => report,
        Err(e) => {
            error!("Boot failed: {}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    info!("Running for {} ms of simulated time...", cli.duration_ms);
    let run = machine.run_for(Duration::from_millis(cli.duration_ms));
    machine.stop();

    let clock_hz = machine.clock_hz();
    let mut waveforms = BTreeMap::new();
    for &(port, pin) in &pins {
        let stats = trace.stats(port, pin, clock_hz);
        info!(
            "P{}{}: {} rising / {} falling edges, {:.3} Hz, {:.1}% duty",
            port.name(),
            pin,
            stats.rising_edges,
            stats.falling_edges,
            stats.frequency_hz.unwrap_or(0.0),
            stats.duty_percent.unwrap_or(0.0)
        );
        waveforms.insert(format!("P{}{}", port.name(), pin), stats);
    }
    info!("Simulation finished.");
    info!("Clock: {} Hz, reload: {}", report.clock_hz, report.reload);
    info!("Total cycles: {}", machine.total_cycles);
    info!("Timer interrupts: {}", metrics.total_dispatches());

    if cli.json {
        let line = serde_json::json!({
            "status": if run.is_ok() { "finished" } else { "error" },
            "clock_hz": report.clock_hz,
            "reload": report.reload,
            "total_cycles": machine.total_cycles,
            "simulated_ms": machine.elapsed().as_secs_f64() * 1000.0,
            "interrupts": metrics.summary(),
            "pins": waveforms,
        });
        println!("{}", line);
    }

    if let Some(path) = &cli.snapshot {
        write_snapshot(path, &machine);
    }

    match run {
        Ok(()) => ExitCode::from(EXIT_PASS),
        Err(e) => {
            error!("Simulation error at cycle {}: {}", machine.total_cycles, e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn write_snapshot(path: &Path, machine: &Machine) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("Failed to create snapshot parent dir {:?}: {}", parent, e);
            return;
        }
    }
    match machine.snapshot().to_json_pretty() {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                error!("Failed to write snapshot {:?}: {}", path, e);
            }
        }
        Err(e) => error!("Failed to serialise snapshot: {}", e),
    }
}

/// Run until the first limit in `limits` trips.
fn run_limited(
    machine: &mut Machine,
    limits: &TestLimits,
    start: Instant,
) -> Result<StopReason, SimulationError> {
    let duration_cycles = limits
        .duration_ms
        .map(|ms| machine.duration_to_cycles(Duration::from_millis(ms)));
    let (target, reason) = match (duration_cycles, limits.max_cycles) {
        (Some(d), Some(m)) if m < d => (m, StopReason::MaxCycles),
        (Some(d), _) => (d, StopReason::Duration),
        (None, Some(m)) => (m, StopReason::MaxCycles),
        (None, None) => (machine.total_cycles, StopReason::Duration),
    };

    // Wall time is checked once per simulated millisecond.
    let chunk = (machine.clock_hz() as u64 / 1000).max(1);
    while machine.total_cycles < target {
        if let Some(wall_time_ms) = limits.wall_time_ms {
            if start.elapsed().as_millis() >= wall_time_ms as u128 {
                return Ok(StopReason::WallTime);
            }
        }
        let step = chunk.min(target - machine.total_cycles);
        machine.run_cycles(step)?;
    }
    Ok(reason)
}

fn run_test(args: &TestArgs, system: Option<PathBuf>) -> ExitCode {
    let script = match TestScript::from_file(&args.script) {
        Ok(script) => script,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(args, system.as_ref(), None, msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let mut limits = script.limits.clone();
    if args.max_cycles.is_some() {
        limits.max_cycles = args.max_cycles;
    }

    let system_path = system.or_else(|| {
        script
            .inputs
            .system
            .as_deref()
            .map(|s| resolve_script_path(&args.script, s))
    });

    let built = load_board(system_path.as_deref()).and_then(|b| system::build_from_board(&b));
    let (mut machine, blinky) = match built {
        Ok(built) => built,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(args, system_path.as_ref(), Some(&limits), msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let trace = Arc::new(PinTrace::new());
    let metrics = Arc::new(InterruptMetrics::new());
    machine.add_observer(trace.clone());
    machine.add_observer(metrics.clone());

    let start = Instant::now();
    let run = machine
        .boot(blinky)
        .and_then(|_| run_limited(&mut machine, &limits, start));
    machine.stop();

    let (stop_reason, sim_error) = match run {
        Ok(reason) => (reason, None),
        Err(e) => {
            error!("Simulation error at cycle {}: {}", machine.total_cycles, e);
            (stop_reason_for(&e), Some(e.to_string()))
        }
    };

    let outcome = RunOutcome {
        machine: &machine,
        trace: &trace,
        metrics: &metrics,
        stop_reason,
    };
    let assertion_results: Vec<_> = script
        .assertions
        .iter()
        .map(|a| evaluate(a, &outcome))
        .collect();
    let all_passed = assertion_results.iter().all(|r| r.passed);
    let expected_stop_reason_matched = assertion_results.iter().any(|r| {
        r.passed && matches!(r.assertion, tm4c_sim_config::TestAssertion::ExpectedStopReason(_))
    });

    let stop_requires_assertion = matches!(stop_reason, StopReason::WallTime);
    let failed = !all_passed || (stop_requires_assertion && !expected_stop_reason_matched);
    let errored = sim_error.is_some() && !expected_stop_reason_matched;
    let status = if failed {
        "fail"
    } else if errored {
        "error"
    } else {
        "pass"
    };

    let simulated = machine.elapsed();
    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        cycles: machine.total_cycles,
        simulated_ms: simulated.as_secs_f64() * 1000.0,
        clock_hz: machine.clock_hz(),
        stop_reason,
        stop_reason_details: build_stop_reason_details(
            stop_reason,
            &limits,
            machine.total_cycles,
            simulated.as_millis().min(u128::from(u64::MAX)) as u64,
            start.elapsed(),
        ),
        limits,
        message: sim_error,
        assertions: assertion_results,
        interrupts: Some(metrics.summary()),
        config: TestConfig {
            system: system_path,
            script: args.script.clone(),
        },
    };

    if let Some(output_dir) = &args.output_dir {
        write_outputs(output_dir, &result, Some(&machine.snapshot()));
    }

    info!(
        "Test {}: stop reason {:?} after {} cycles",
        status, stop_reason, result.cycles
    );

    if failed {
        ExitCode::from(EXIT_ASSERT_FAIL)
    } else if errored {
        ExitCode::from(EXIT_RUNTIME_ERROR)
    } else {
        ExitCode::from(EXIT_PASS)
    }
}

fn write_config_error_outputs(
    args: &TestArgs,
    system_path: Option<&PathBuf>,
    limits: Option<&TestLimits>,
    message: String,
) {
    let Some(output_dir) = &args.output_dir else {
        return;
    };
    let limits = limits.cloned().unwrap_or_default();
    let stop_reason = StopReason::ConfigError;
    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: "error".to_string(),
        cycles: 0,
        simulated_ms: 0.0,
        clock_hz: 0,
        stop_reason,
        stop_reason_details: build_stop_reason_details(
            stop_reason,
            &limits,
            0,
            0,
            Duration::ZERO,
        ),
        limits,
        message: Some(message),
        assertions: vec![],
        interrupts: None,
        config: TestConfig {
            system: system_path.cloned(),
            script: args.script.clone(),
        },
    };
    write_outputs(output_dir, &result, None);
}
