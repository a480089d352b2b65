//! netroster — privacy-preserving device inventory CLI
//!
//! Reconciles imported client lists against a hashed device roster,
//! raises deduplicated alerts, and scores device risk. Raw MAC and IP
//! addresses never reach the database; only HMAC fingerprints and
//! masked values are stored.

use netroster::app;
use netroster::logging::init_logging;

fn main() {
    // Keep going without file logging rather than refusing to run.
    if let Err(e) = init_logging() {
        eprintln!("Warning: failed to initialize log file: {}", e);
    }

    if let Err(e) = app::run(std::env::args()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
