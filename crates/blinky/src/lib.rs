// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Register-level drivers and the Timer0A LED blinker for the TM4C123GH6PM.
//!
//! All register access goes through [`hw::Hardware`], so the same code runs
//! on the chip (MMIO) and against the host simulator.

#![cfg_attr(not(test), no_std)]

pub mod app;
pub mod gpio;
pub mod hw;
pub mod nvic;
pub mod regs;
pub mod sysctl;
pub mod timer;

pub use app::{BlinkConfig, Blinky, InitReport, OutputPhase};
pub use hw::{Hardware, InterruptHandler};
pub use nvic::Irq;
