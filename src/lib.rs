//! Kolibri reasoning core - a deterministic symbolic-reasoning engine.
//!
//! At every tick the engine (a) aggregates votes from a fractal hierarchy of
//! digit agents, (b) proposes a symbolic expression over a small
//! domain-specific algebra, (c) scores that expression against a fixed
//! benchmark suite, and (d) appends a cryptographically chained,
//! tamper-evident record to an append-only ledger. Two conforming
//! implementations given the same configuration and seed produce
//! byte-identical ledger lines.
//!
//! # Architecture
//!
//! - **rng**: xorshift64 draws, splitmix64 seed derivation
//! - **numfmt**: canonical `%.17g`-equivalent double printing
//! - **config**: tunable knobs, canonical JSON, SHA-256 fingerprint
//! - **dsl**: the expression algebra (eval, gradient, complexity, render)
//! - **field**: the fractal digit-agent hierarchy
//! - **vote**: depth-decay/quorum/temperature vote policy
//! - **fa**: Fractal Address codec and transform pipeline
//! - **fit**: fixed-schedule Adam parameter fitter
//! - **bench**: the ten fixed benchmark targets
//! - **payload**: canonical JSON payload builder
//! - **ledger**: append/load/verify, filesystem boundary traits
//! - **engine**: the stateful step orchestrator
//! - **hash**: SHA-256/HMAC-SHA-256 primitives
//! - **errors**: typed, no-panic error handling
//!
//! # Usage
//!
//! ```rust
//! use kolibri_core::config::Config;
//! use kolibri_core::engine::Engine;
//! use kolibri_core::ledger::FileLineWriter;
//!
//! # fn run() -> kolibri_core::Result<()> {
//! let cfg = Config::default();
//! let mut engine = Engine::new(cfg);
//! let path = std::env::temp_dir().join("kolibri-doctest.jsonl");
//! let mut writer = FileLineWriter::create(&path)?;
//! let block = engine.step(&mut writer)?;
//! assert_eq!(block.step, 1);
//! # std::fs::remove_file(&path).ok();
//! # Ok(())
//! # }
//! ```

pub mod bench;
pub mod config;
pub mod dsl;
pub mod engine;
pub mod errors;
pub mod fa;
pub mod field;
pub mod fit;
pub mod hash;
pub mod ledger;
pub mod numfmt;
pub mod payload;
pub mod rng;
pub mod vote;

pub use engine::Engine;
pub use errors::{KolibriError, Result};
pub use payload::ReasonBlock;

/// Library version (matches Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Wire format version of the canonical payload schema (§6).
pub const PAYLOAD_FORMAT: &str = "v1";

/// Version info as a string, for logs and diagnostics.
pub fn version_info() -> String {
    format!("{} v{} (payload {})", NAME, VERSION, PAYLOAD_FORMAT)
}
