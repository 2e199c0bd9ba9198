//! Logging initialization.
//!
//! Components log through the `log` facade with a `[TAG]` prefix per
//! subsystem (`[SESSION]`, `[TIMELINE]`, `[STORAGE]`, `[CLEANUP]`); the
//! embedding application decides the sink. This helper wires up
//! `env_logger` for binaries and tests that have no logger of their own.

use env_logger::Env;

/// Initialize `env_logger` with an `info` default, honouring `RUST_LOG`.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
