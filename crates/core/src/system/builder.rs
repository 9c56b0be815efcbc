// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::SystemBus;
use crate::Machine;
use std::path::Path;
use tm4c_blinky::Blinky;
use tm4c_sim_config::BoardConfig;
use tracing::info;

/// The TM4C123GH6PM peripheral map, all blocks at reset.
pub fn build_system_bus() -> SystemBus {
    info!("Using TM4C123GH6PM peripheral map");
    SystemBus::new()
}

/// A fresh machine plus the blinker configured for `board`. Nothing has
/// run yet; pass the blinker to [`Machine::boot`].
pub fn build_from_board(board: &BoardConfig) -> anyhow::Result<(Machine, Blinky)> {
    let config = board.blink_config()?;
    info!(
        "Board {}: P{} outputs {:#04x}, timer{}, {} Hz toggle",
        board.name,
        config.port.name(),
        config.outputs.bits(),
        config.timer.index(),
        config.toggle_hz
    );
    Ok((Machine::new(build_system_bus()), Blinky::new(config)))
}

/// Load the board file at `board_path` (or the default board) and build
/// a machine for it.
pub fn build_machine(board_path: Option<&Path>) -> anyhow::Result<(Machine, Blinky)> {
    let board = tm4c_sim_config::load_board(board_path)?;
    build_from_board(&board)
}
