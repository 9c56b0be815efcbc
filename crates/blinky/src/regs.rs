// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! TM4C123GH6PM register map, limited to the blocks the blinker touches.

// System Control
pub const SYSCTL_BASE: u32 = 0x400F_E000;
pub const SYSCTL_RIS: u32 = SYSCTL_BASE + 0x050;
pub const SYSCTL_MISC: u32 = SYSCTL_BASE + 0x058;
pub const SYSCTL_RCC: u32 = SYSCTL_BASE + 0x060;
pub const SYSCTL_RCGCTIMER: u32 = SYSCTL_BASE + 0x604;
pub const SYSCTL_RCGCGPIO: u32 = SYSCTL_BASE + 0x608;
pub const SYSCTL_PRTIMER: u32 = SYSCTL_BASE + 0xA04;
pub const SYSCTL_PRGPIO: u32 = SYSCTL_BASE + 0xA08;

pub const RCC_RESET: u32 = 0x078E_3AD1;
pub const RCC_MOSCDIS: u32 = 1 << 0;
pub const RCC_OSCSRC_SHIFT: u32 = 4;
pub const RCC_OSCSRC_MASK: u32 = 0x3 << RCC_OSCSRC_SHIFT;
pub const RCC_XTAL_SHIFT: u32 = 6;
pub const RCC_XTAL_MASK: u32 = 0x1F << RCC_XTAL_SHIFT;
pub const RCC_BYPASS: u32 = 1 << 11;
pub const RCC_PWRDN: u32 = 1 << 13;
pub const RCC_USESYSDIV: u32 = 1 << 22;
pub const RCC_SYSDIV_SHIFT: u32 = 23;
pub const RCC_SYSDIV_MASK: u32 = 0xF << RCC_SYSDIV_SHIFT;

/// PLL lock, raw status in RIS and write-1-to-clear in MISC.
pub const SYSCTL_PLLLRIS: u32 = 1 << 6;

// GPIO (APB aperture). DATA is address-masked: bits [9:2] of the offset
// select which pins a read or write can see.
pub const GPIO_PORTA_BASE: u32 = 0x4000_4000;
pub const GPIO_PORTB_BASE: u32 = 0x4000_5000;
pub const GPIO_PORTC_BASE: u32 = 0x4000_6000;
pub const GPIO_PORTD_BASE: u32 = 0x4000_7000;
pub const GPIO_PORTE_BASE: u32 = 0x4002_4000;
pub const GPIO_PORTF_BASE: u32 = 0x4002_5000;

pub const GPIO_DATA: u32 = 0x000;
pub const GPIO_DIR: u32 = 0x400;
pub const GPIO_AFSEL: u32 = 0x420;
pub const GPIO_DR2R: u32 = 0x500;
/// Open-drain select, not output data.
pub const GPIO_ODR: u32 = 0x50C;
pub const GPIO_PUR: u32 = 0x510;
pub const GPIO_PDR: u32 = 0x514;
pub const GPIO_DEN: u32 = 0x51C;

// General-purpose timers (16/32-bit blocks)
pub const TIMER0_BASE: u32 = 0x4003_0000;
pub const TIMER_BLOCK_STRIDE: u32 = 0x1000;

pub const GPTM_CFG: u32 = 0x000;
pub const GPTM_TAMR: u32 = 0x004;
pub const GPTM_CTL: u32 = 0x00C;
pub const GPTM_IMR: u32 = 0x018;
pub const GPTM_RIS: u32 = 0x01C;
pub const GPTM_MIS: u32 = 0x020;
pub const GPTM_ICR: u32 = 0x024;
pub const GPTM_TAILR: u32 = 0x028;
pub const GPTM_TAR: u32 = 0x048;
pub const GPTM_TAV: u32 = 0x050;

pub const GPTM_CFG_32BIT: u32 = 0x0;
pub const GPTM_TAMR_ONESHOT: u32 = 0x1;
pub const GPTM_TAMR_PERIODIC: u32 = 0x2;
pub const GPTM_TAMR_MODE_MASK: u32 = 0x3;
pub const GPTM_TAMR_TACDIR: u32 = 1 << 4;
pub const GPTM_CTL_TAEN: u32 = 1 << 0;
pub const GPTM_CTL_TBEN: u32 = 1 << 8;

// NVIC (Cortex-M4 system control space)
pub const NVIC_EN0: u32 = 0xE000_E100;
pub const NVIC_DIS0: u32 = 0xE000_E180;
pub const NVIC_PEND0: u32 = 0xE000_E200;
pub const NVIC_UNPEND0: u32 = 0xE000_E280;
