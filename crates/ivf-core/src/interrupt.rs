use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation probe (C10). Checked once per query
/// iteration; first detection sets a sticky flag that the caller is
/// expected to observe after the parallel region drains.
pub trait InterruptHook: Send + Sync {
    fn is_interrupted(&self) -> bool;
}

/// Default hook: never interrupts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverInterrupt;

impl InterruptHook for NeverInterrupt {
    fn is_interrupted(&self) -> bool {
        false
    }
}

/// An atomic flag a caller can flip from another thread to request
/// cancellation of an in-flight search or add. Sticky: once set, stays
/// set until explicitly cleared.
#[derive(Debug, Default)]
pub struct AtomicInterrupt {
    flag: AtomicBool,
}

impl AtomicInterrupt {
    pub fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl InterruptHook for AtomicInterrupt {
    fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_interrupt_is_always_false() {
        assert!(!NeverInterrupt.is_interrupted());
    }

    #[test]
    fn atomic_interrupt_is_sticky() {
        let hook = AtomicInterrupt::new();
        assert!(!hook.is_interrupted());
        hook.request();
        assert!(hook.is_interrupted());
        assert!(hook.is_interrupted());
        hook.clear();
        assert!(!hook.is_interrupted());
    }
}
