// ABOUTME: Configuration and constants for the Veld interpreter

pub const VERSION: &str = "1.0.0";
pub const WELCOME_MESSAGE: &str = "Veld 1.0";
pub const WELCOME_SUBTITLE: &str =
    "A tree-walking interpreter with classes, closures, and collections";
pub const WELCOME_FOOTER: &str = "Type any statement to evaluate it. Use Ctrl-D to exit.";

/// REPL history lands next to wherever the interpreter was started.
pub const HISTORY_FILE: &str = ".veld_history";

/// Host-controlled interpreter switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Expose host-facing built-ins such as `input`.
    pub unsafe_mode: bool,
}
