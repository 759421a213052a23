//! One-line hook diagnostics on stderr.

/// Environment variable consulted for debug switches.
pub const DEBUG_ENV: &str = "SEALBOX_DEBUG";

/// Token inside [`DEBUG_ENV`] that turns snapshot diagnostics on.
pub const DEBUG_TOKEN: &str = "snapshot";

/// Diagnostics switch, sampled once at install time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Trace {
    enabled: bool,
}

impl Trace {
    pub fn from_env() -> Self {
        let enabled = std::env::var(DEBUG_ENV)
            .map(|v| v.contains(DEBUG_TOKEN))
            .unwrap_or(false);
        Self { enabled }
    }

    /// One line per hook invocation: hook name, input, translated path.
    pub fn record(&self, hook: &str, input: &str, translated: &str) {
        if self.enabled {
            eprintln!("sealbox {}: {} -> {}", hook, input, translated);
        }
    }
}
