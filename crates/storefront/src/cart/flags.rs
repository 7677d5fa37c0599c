//! Panel visibility and loading state shared by both engines.

use std::sync::atomic::{AtomicBool, Ordering};

/// UI-facing flags of a cart.
///
/// `loading` is a single boolean, not a counter: overlapping operations all
/// set and clear the same flag.
#[derive(Debug, Default)]
pub struct UiFlags {
    open: AtomicBool,
    loading: AtomicBool,
}

impl UiFlags {
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn toggle(&self) {
        self.open.fetch_xor(true, Ordering::SeqCst);
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Mark an operation as started.
    pub fn begin(&self) {
        self.loading.store(true, Ordering::SeqCst);
    }

    /// Mark an operation as settled. Call only after its result (if any) is
    /// visible to readers.
    pub fn settle(&self) {
        self.loading.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_panel() {
        let flags = UiFlags::default();
        assert!(!flags.is_open());
        flags.toggle();
        assert!(flags.is_open());
        flags.toggle();
        assert!(!flags.is_open());
    }

    #[test]
    fn test_loading_is_a_single_flag() {
        let flags = UiFlags::default();
        flags.begin();
        flags.begin();
        flags.settle();
        assert!(!flags.is_loading());
    }
}
