// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::collections::BTreeMap;
use tm4c_blinky::{InterruptHandler, Irq};

pub type BoxedHandler = Box<dyn InterruptHandler + Send>;

/// Handlers indexed by the IRQ they serve.
///
/// A handler is taken out of the table for the duration of its own
/// dispatch and put back afterwards.
#[derive(Default)]
pub struct VectorTable {
    handlers: BTreeMap<Irq, BoxedHandler>,
}

impl std::fmt::Debug for VectorTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

impl VectorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` on its IRQ, returning whatever was there before.
    pub fn register(&mut self, handler: BoxedHandler) -> Option<BoxedHandler> {
        let irq = handler.irq();
        let previous = self.handlers.insert(irq, handler);
        if previous.is_some() {
            tracing::warn!("Replacing handler for {}", irq);
        } else {
            tracing::debug!("Registered handler for {}", irq);
        }
        previous
    }

    pub fn take(&mut self, irq: Irq) -> Option<BoxedHandler> {
        self.handlers.remove(&irq)
    }

    pub fn restore(&mut self, handler: BoxedHandler) {
        self.handlers.insert(handler.irq(), handler);
    }

    pub fn contains(&self, irq: Irq) -> bool {
        self.handlers.contains_key(&irq)
    }

    pub fn irqs(&self) -> impl Iterator<Item = Irq> + '_ {
        self.handlers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm4c_blinky::Hardware;

    struct Counter(Irq, u32);

    impl InterruptHandler for Counter {
        fn irq(&self) -> Irq {
            self.0
        }
        fn on_interrupt(&mut self, _hw: &mut dyn Hardware) {
            self.1 += 1;
        }
    }

    #[test]
    fn test_register_take_restore() {
        let mut table = VectorTable::new();
        assert!(table.register(Box::new(Counter(Irq::TIMER0A, 0))).is_none());
        assert!(table.register(Box::new(Counter(Irq::TIMER1A, 0))).is_none());
        assert_eq!(table.len(), 2);

        let handler = table.take(Irq::TIMER0A).unwrap();
        assert!(!table.contains(Irq::TIMER0A));
        table.restore(handler);
        assert!(table.contains(Irq::TIMER0A));
        assert_eq!(
            table.irqs().collect::<Vec<_>>(),
            vec![Irq::TIMER0A, Irq::TIMER1A]
        );
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut table = VectorTable::new();
        table.register(Box::new(Counter(Irq::TIMER0A, 1)));
        let old = table.register(Box::new(Counter(Irq::TIMER0A, 2)));
        assert_eq!(old.map(|h| h.irq()), Some(Irq::TIMER0A));
        assert_eq!(table.len(), 1);
    }
}
