//! Append-only ledger: write, load, and strict verification of a chain of
//! `ReasonBlock`s. Filesystem and clock are injectable capabilities (§5) so
//! the core never hard-codes a path or a wall-clock read.

use std::io::{BufRead, Write};

use crate::errors::{KolibriError, Result};
use crate::hash::{hmac_sha256_hex, sha256};
use crate::payload::{build_payload, ReasonBlock};

/// A monotone line-appending writer. `append_line` and `flush` are the only
/// operations permitted to block on the filesystem (§5).
pub trait LineWriter {
    fn append_line(&mut self, line: &str) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// A line-reading boundary over an existing ledger file.
pub trait LineReader {
    fn lines(&mut self) -> Result<Vec<String>>;
}

/// The subset of `Config` that `verify` needs to check a ledger against:
/// the HMAC key (empty means unauthenticated) and the expected salt (empty
/// means no salt is enforced). Kept separate from `Config` itself so
/// `verify` doesn't depend on the full set of numeric tuning knobs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerConfig {
    pub hmac_key: String,
    pub salt: String,
}

impl LedgerConfig {
    pub fn new(hmac_key: &str, salt: &str) -> LedgerConfig {
        LedgerConfig {
            hmac_key: hmac_key.to_string(),
            salt: salt.to_string(),
        }
    }
}

/// A `LineWriter` backed by a real file, opened in append mode.
pub struct FileLineWriter {
    file: std::fs::File,
}

impl FileLineWriter {
    pub fn create(path: &std::path::Path) -> Result<FileLineWriter> {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(FileLineWriter { file })
    }
}

impl LineWriter for FileLineWriter {
    fn append_line(&mut self, line: &str) -> Result<()> {
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

/// A `LineReader` backed by a real file.
pub struct FileLineReader {
    path: std::path::PathBuf,
}

impl FileLineReader {
    pub fn open(path: &std::path::Path) -> FileLineReader {
        FileLineReader { path: path.to_path_buf() }
    }
}

impl LineReader for FileLineReader {
    fn lines(&mut self) -> Result<Vec<String>> {
        let file = std::fs::File::open(&self.path)?;
        let reader = std::io::BufReader::new(file);
        let mut out = Vec::new();
        for line in reader.lines() {
            out.push(line?);
        }
        Ok(out)
    }
}

/// Append `block` to the ledger via `writer`. Writes
/// `canonical_payload_without_hash_or_hmac` (trailing `}` dropped) followed
/// by `,"hash":"<hex>","hmac":"<hex>"}` (§4.8). `block.hash`/`block.hmac`
/// must already be populated by the caller (the step engine computes them
/// from the hash-only payload before calling this).
pub fn append(writer: &mut dyn LineWriter, block: &ReasonBlock) -> Result<()> {
    let line = build_payload(block, true)?;
    writer.append_line(&line)
}

/// Compute the payload bytes to hash (no `hash`/`hmac` fields) and its
/// SHA-256 / HMAC-SHA-256, returning `(hash_hex, hmac_hex)`.
pub fn compute_digests(block: &ReasonBlock, hmac_key: &str) -> Result<(String, String)> {
    let payload = build_payload(block, false)?;
    let hash_hex = hex::encode(sha256(payload.as_bytes()));
    let hmac_hex = hmac_sha256_hex(hmac_key, payload.as_bytes())?;
    Ok((hash_hex, hmac_hex))
}

/// Parse a single canonical ledger line back into a `ReasonBlock`. The
/// schema's field order is known and fixed, so this is a single strict
/// pass, not a general JSON parser (§9).
pub fn parse_line(line: &str, step_index: u64) -> Result<ReasonBlock> {
    let v: serde_json::Value = serde_json::from_str(line).map_err(|e| KolibriError::ChainInvalid {
        step: step_index,
        reason: format!("parse error: {}", e),
    })?;
    let get_str = |k: &str| -> Result<String> {
        v.get(k)
            .and_then(|x| x.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| KolibriError::ChainInvalid {
                step: step_index,
                reason: format!("missing or non-string field {}", k),
            })
    };
    let get_u64 = |k: &str| -> Result<u64> {
        v.get(k).and_then(|x| x.as_u64()).ok_or_else(|| KolibriError::ChainInvalid {
            step: step_index,
            reason: format!("missing or non-integer field {}", k),
        })
    };
    let get_f64 = |k: &str| -> Result<f64> {
        v.get(k).and_then(|x| x.as_f64()).ok_or_else(|| KolibriError::ChainInvalid {
            step: step_index,
            reason: format!("missing or non-numeric field {}", k),
        })
    };
    let get_f64_array = |k: &str| -> Result<Vec<f64>> {
        v.get(k)
            .and_then(|x| x.as_array())
            .map(|a| a.iter().filter_map(|x| x.as_f64()).collect())
            .ok_or_else(|| KolibriError::ChainInvalid {
                step: step_index,
                reason: format!("missing or non-array field {}", k),
            })
    };

    let votes_vec = get_f64_array("votes")?;
    let bench_vec = get_f64_array("bench")?;
    let mut votes = [0.0f64; 10];
    let mut bench = [0.0f64; 10];
    votes[..votes_vec.len().min(10)].copy_from_slice(&votes_vec[..votes_vec.len().min(10)]);
    bench[..bench_vec.len().min(10)].copy_from_slice(&bench_vec[..bench_vec.len().min(10)]);

    Ok(ReasonBlock {
        step: get_u64("step")?,
        parent: get_u64("parent")?,
        seed: get_u64("seed")?,
        config_fingerprint: get_str("config_fingerprint")?,
        fmt: get_str("fmt")?,
        formula: get_str("formula")?,
        param_count: get_u64("param_count")? as u8,
        params: get_f64_array("params")?,
        eff: get_f64("eff")?,
        compl: get_f64("compl")?,
        prev: get_str("prev")?,
        votes,
        vote_softmax: get_f64("vote_softmax")?,
        vote_median: get_f64("vote_median")?,
        bench,
        memory: get_str("memory")?,
        merkle: get_str("merkle")?,
        fa: get_str("fa")?,
        fa_stab: get_u64("fa_stab")? as u8,
        fa_map: get_str("fa_map")?,
        r: get_f64("r")?,
        salt: get_str("salt")?,
        hash: get_str("hash")?,
        hmac: get_str("hmac")?,
    })
}

/// Load every block from `reader`.
pub fn load(reader: &mut dyn LineReader) -> Result<Vec<ReasonBlock>> {
    let lines = reader.lines()?;
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| parse_line(line, i as u64))
        .collect()
}

/// Strict chain verification (§4.8). Stops at the first failure. Returns
/// the number of verified blocks on success; the message format matches
/// the reference CLI's `"OK: chain verified (N blocks)"` convention.
pub fn verify(reader: &mut dyn LineReader, cfg: &LedgerConfig) -> Result<String> {
    let hmac_key = cfg.hmac_key.as_str();
    let blocks = load(reader)?;
    if blocks.is_empty() {
        return Err(KolibriError::ChainInvalid {
            step: 0,
            reason: "no blocks in ledger".to_string(),
        });
    }

    let mut prev_hash = String::new();
    for (i, block) in blocks.iter().enumerate() {
        if block.prev != prev_hash {
            return Err(KolibriError::ChainInvalid {
                step: block.step,
                reason: "prev mismatch".to_string(),
            });
        }

        let payload = build_payload(block, false)?;
        let expected_hash = hex::encode(sha256(payload.as_bytes()));
        if expected_hash != block.hash {
            return Err(KolibriError::ChainInvalid {
                step: block.step,
                reason: "hash mismatch".to_string(),
            });
        }

        let has_hmac = !block.hmac.is_empty();
        let key_configured = !hmac_key.is_empty();
        if key_configured && !has_hmac {
            return Err(KolibriError::ChainInvalid {
                step: block.step,
                reason: "missing hmac with configured key".to_string(),
            });
        }
        if !key_configured && has_hmac {
            return Err(KolibriError::ChainInvalid {
                step: block.step,
                reason: "unexpected hmac without configured key".to_string(),
            });
        }
        if key_configured {
            let expected_hmac = hmac_sha256_hex(hmac_key, payload.as_bytes())?;
            if expected_hmac != block.hmac {
                return Err(KolibriError::ChainInvalid {
                    step: block.step,
                    reason: "hmac mismatch".to_string(),
                });
            }
        }

        let expected_step = i as u64 + 1;
        if block.step != expected_step {
            return Err(KolibriError::ChainInvalid {
                step: block.step,
                reason: "step non-monotone".to_string(),
            });
        }
        if block.parent != block.step - 1 {
            return Err(KolibriError::ChainInvalid {
                step: block.step,
                reason: "parent mismatch".to_string(),
            });
        }
        if !cfg.salt.is_empty() && block.salt != cfg.salt {
            return Err(KolibriError::ChainInvalid {
                step: block.step,
                reason: "salt mismatch".to_string(),
            });
        }

        prev_hash = block.hash.clone();
    }

    tracing::info!(blocks = blocks.len(), "chain verified");
    Ok(format!("OK: chain verified ({} blocks)", blocks.len()))
}
