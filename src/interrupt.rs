// ABOUTME: Single SIGINT listener fanning out to per-interpreter cancel tokens

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once, Weak};

static REGISTRY: Mutex<Vec<Weak<AtomicBool>>> = Mutex::new(Vec::new());
static INSTALL: Once = Once::new();

/// Hands out a fresh cancellation token and makes sure the process-wide
/// SIGINT listener is installed. Ctrl-C flips every live token; each
/// interpreter samples (and clears) only its own at loop boundaries.
pub fn register() -> Arc<AtomicBool> {
    INSTALL.call_once(|| {
        // Registration fails only if another handler owns the signal;
        // loops then simply never observe an interrupt.
        let _ = ctrlc::set_handler(notify_all);
    });

    let token = Arc::new(AtomicBool::new(false));
    if let Ok(mut tokens) = REGISTRY.lock() {
        tokens.retain(|t| t.strong_count() > 0);
        tokens.push(Arc::downgrade(&token));
    }
    token
}

fn notify_all() {
    if let Ok(tokens) = REGISTRY.lock() {
        for token in tokens.iter() {
            if let Some(token) = token.upgrade() {
                token.store(true, Ordering::SeqCst);
            }
        }
    }
}
