use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative interrupt flag. The acquisition loop checks it at the top of
/// each tick; once raised, the finalize path always runs to completion.
#[derive(Clone)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
}

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Install a Ctrl-C handler that raises the flag. Call at most once per
    /// process; a second installation fails inside `ctrlc`.
    pub fn install(self) -> Result<Self, ctrlc::Error> {
        let requested = Arc::clone(&self.requested);
        ctrlc::set_handler(move || {
            tracing::info!("Interrupt received, ending recording session...");
            requested.store(true, Ordering::SeqCst);
        })?;
        Ok(self)
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_starts_clear() {
        assert!(!ShutdownFlag::new().is_requested());
    }

    #[test]
    fn request_raises_flag_for_all_clones() {
        let flag = ShutdownFlag::new();
        let observer = flag.clone();
        flag.request();
        assert!(observer.is_requested());
    }
}
