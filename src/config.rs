//! Tunable configuration, its canonical serialization, and its SHA-256
//! fingerprint (§4.9). Loaded once and frozen for the lifetime of an
//! `Engine` (§3 "Lifecycles").

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{KolibriError, Result};
use crate::hash::sha256_hex_str;
use crate::numfmt::print_canonical;

fn default_steps() -> i64 {
    30
}
fn default_depth_max() -> i64 {
    2
}
fn default_depth_decay() -> f64 {
    0.7
}
fn default_quorum() -> f64 {
    0.6
}
fn default_temperature() -> f64 {
    0.15
}
fn default_eff_threshold() -> f64 {
    0.8
}
fn default_max_complexity() -> f64 {
    32.0
}
fn default_seed() -> u64 {
    987654321
}

/// Tunable knobs recognized from a configuration file (§6). `hmac_key` and
/// `salt` are carried alongside the eight fingerprinted numeric knobs but do
/// not themselves enter the fingerprint. `salt`, when non-empty, is copied
/// onto every block at assembly time and checked by `ledger::verify` via a
/// `LedgerConfig` - see `SPEC_FULL.md`'s resolution of the `hmac_alg`/`salt`
/// discrepancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_steps")]
    pub steps: i64,
    #[serde(default = "default_depth_max")]
    pub depth_max: i64,
    #[serde(default = "default_depth_decay")]
    pub depth_decay: f64,
    #[serde(default = "default_quorum")]
    pub quorum: f64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_eff_threshold")]
    pub eff_threshold: f64,
    #[serde(default = "default_max_complexity")]
    pub max_complexity: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub hmac_key: String,
    #[serde(default)]
    pub salt: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            steps: default_steps(),
            depth_max: default_depth_max(),
            depth_decay: default_depth_decay(),
            quorum: default_quorum(),
            temperature: default_temperature(),
            eff_threshold: default_eff_threshold(),
            max_complexity: default_max_complexity(),
            seed: default_seed(),
            hmac_key: String::new(),
            salt: String::new(),
        }
    }
}

/// Outcome of a load attempt, kept for the snapshot's `source`/
/// `loaded_from_file` fields.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub config: Config,
    pub loaded_from_file: bool,
    pub source: String,
}

impl Config {
    /// Load configuration from `path` (if given), falling back to defaults
    /// on a missing or malformed file. Per §7, `ConfigParse` is a warning,
    /// not a fatal error - this function never fails.
    pub fn load(path: Option<&Path>) -> LoadReport {
        let mut report = match path {
            None => LoadReport {
                config: Config::default(),
                loaded_from_file: false,
                source: "defaults".to_string(),
            },
            Some(p) => match std::fs::read_to_string(p) {
                Ok(text) => match serde_json::from_str::<Config>(&text) {
                    Ok(cfg) => LoadReport {
                        config: cfg,
                        loaded_from_file: true,
                        source: p.display().to_string(),
                    },
                    Err(e) => {
                        let err = KolibriError::ConfigParse {
                            path: p.display().to_string(),
                            reason: e.to_string(),
                        };
                        tracing::warn!(error = %err, "config parse failed, using defaults");
                        LoadReport {
                            config: Config::default(),
                            loaded_from_file: false,
                            source: format!("{} (not loaded: {})", p.display(), e),
                        }
                    }
                },
                Err(e) => {
                    let err = KolibriError::ConfigParse {
                        path: p.display().to_string(),
                        reason: e.to_string(),
                    };
                    tracing::warn!(error = %err, "config file unreadable, using defaults");
                    LoadReport {
                        config: Config::default(),
                        loaded_from_file: false,
                        source: format!("{} (not loaded: {})", p.display(), e),
                    }
                }
            },
        };

        // KOLIBRI_HMAC_KEY is one permitted key source; cfg.hmac_key is the
        // other. The environment variable takes precedence when present.
        if let Ok(key) = env::var("KOLIBRI_HMAC_KEY") {
            report.config.hmac_key = key;
        }

        report
    }

    /// Canonical JSON of the eight fingerprinted numeric knobs, in
    /// lexicographic key order, each number via the canonical printer, no
    /// spaces (§4.9).
    pub fn canonical_json(&self) -> String {
        format!(
            concat!(
                "{{\"depth_decay\":{},\"depth_max\":{},\"eff_threshold\":{},",
                "\"max_complexity\":{},\"quorum\":{},\"seed\":{},\"steps\":{},",
                "\"temperature\":{}}}"
            ),
            print_canonical(self.depth_decay),
            self.depth_max,
            print_canonical(self.eff_threshold),
            print_canonical(self.max_complexity),
            print_canonical(self.quorum),
            self.seed,
            self.steps,
            print_canonical(self.temperature),
        )
    }

    /// Lower-case hex SHA-256 of `canonical_json()`.
    pub fn fingerprint(&self) -> String {
        sha256_hex_str(&self.canonical_json())
    }

    /// Write a human-readable snapshot (§6 "persisted state":
    /// `logs/config_snapshot.json`).
    pub fn write_snapshot(&self, path: &Path, report: &LoadReport) -> Result<()> {
        let snapshot = ConfigSnapshot {
            source: report.source.clone(),
            loaded_from_file: report.loaded_from_file,
            canonical_json: self.canonical_json(),
            fingerprint: self.fingerprint(),
        };
        let text = serde_json::to_string_pretty(&snapshot).map_err(|e| KolibriError::Io(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
struct ConfigSnapshot {
    source: String,
    loaded_from_file: bool,
    canonical_json: String,
    fingerprint: String,
}
