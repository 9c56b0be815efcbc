// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.
#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod device {
    use core::sync::atomic::{AtomicBool, Ordering};
    use cortex_m_rt::{entry, exception};
    use panic_halt as _;
    use tm4c_blinky::{BlinkConfig, Blinky, Hardware};

    static BLINKY: Blinky = Blinky::new(BlinkConfig::DEFAULT);
    static MMIO_TAKEN: AtomicBool = AtomicBool::new(false);

    /// Token for the memory-mapped register file.
    struct Mmio {
        _private: (),
    }

    impl Mmio {
        fn take() -> Option<Self> {
            if MMIO_TAKEN.swap(true, Ordering::AcqRel) {
                None
            } else {
                Some(Self { _private: () })
            }
        }

        /// Second handle for the timer interrupt. Main stops touching
        /// registers once `init` returns, so the handler is the only writer.
        unsafe fn steal() -> Self {
            Self { _private: () }
        }
    }

    impl Hardware for Mmio {
        fn read(&self, addr: u32) -> u32 {
            unsafe { core::ptr::read_volatile(addr as *const u32) }
        }

        fn write(&mut self, addr: u32, value: u32) {
            unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
        }

        fn enable_interrupts(&mut self) {
            unsafe { cortex_m::interrupt::enable() }
        }

        fn disable_interrupts(&mut self) {
            cortex_m::interrupt::disable()
        }
    }

    #[entry]
    fn main() -> ! {
        let Some(mut hw) = Mmio::take() else {
            loop {
                cortex_m::asm::wfi();
            }
        };

        BLINKY.init(&mut hw);

        loop {
            cortex_m::asm::nop();
        }
    }

    #[exception]
    unsafe fn DefaultHandler(irqn: i16) {
        if irqn == BLINKY.config().timer.irq_a().number() as i16 {
            let mut hw = Mmio::steal();
            BLINKY.on_timer_timeout(&mut hw);
            return;
        }

        // Nothing else is enabled; park so a debugger can see where we are.
        cortex_m::interrupt::disable();
        loop {
            cortex_m::asm::bkpt();
        }
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}
