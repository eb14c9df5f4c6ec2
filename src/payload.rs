//! Canonical JSON payload builder. A single fixed-order, fixed-format
//! builder (§9 "ad-hoc JSON parsing scattered through sources" - replaced
//! here with one strict writer), never a generic serializer: the field
//! order and number format in §6 are the wire contract, not an
//! implementation detail `serde_json` happens to produce today.

use crate::errors::{KolibriError, Result};
use crate::numfmt::print_canonical;

const MAX_PAYLOAD_BYTES: usize = 4096;

/// In-memory step record (§3). `hash`/`hmac` are populated after the
/// payload is built and hashed; they are not inputs to `build_payload`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasonBlock {
    pub step: u64,
    pub parent: u64,
    pub seed: u64,
    pub config_fingerprint: String,
    pub fmt: String,
    pub formula: String,
    pub param_count: u8,
    pub params: Vec<f64>,
    pub eff: f64,
    pub compl: f64,
    pub prev: String,
    pub votes: [f64; 10],
    pub vote_softmax: f64,
    pub vote_median: f64,
    pub bench: [f64; 10],
    pub memory: String,
    pub merkle: String,
    pub fa: String,
    pub fa_stab: u8,
    pub fa_map: String,
    pub r: f64,
    pub salt: String,
    pub hash: String,
    pub hmac: String,
}

fn escape_json_string(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
}

fn push_string_field(out: &mut String, first: &mut bool, name: &str, value: &str) {
    push_prefix(out, first);
    out.push('"');
    out.push_str(name);
    out.push_str("\":\"");
    escape_json_string(value, out);
    out.push('"');
}

fn push_int_field(out: &mut String, first: &mut bool, name: &str, value: impl std::fmt::Display) {
    push_prefix(out, first);
    out.push('"');
    out.push_str(name);
    out.push_str("\":");
    out.push_str(&value.to_string());
}

fn push_double_field(out: &mut String, first: &mut bool, name: &str, value: f64) {
    push_prefix(out, first);
    out.push('"');
    out.push_str(name);
    out.push_str("\":");
    out.push_str(&print_canonical(value));
}

fn push_double_array_field(out: &mut String, first: &mut bool, name: &str, values: &[f64]) {
    push_prefix(out, first);
    out.push('"');
    out.push_str(name);
    out.push_str("\":[");
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&print_canonical(*v));
    }
    out.push(']');
}

fn push_prefix(out: &mut String, first: &mut bool) {
    if *first {
        *first = false;
    } else {
        out.push(',');
    }
}

/// Build the canonical payload, fields in the exact order frozen by §6.
/// When `with_crypto` is true, `hash`/`hmac` are appended as the final two
/// fields (used by the ledger writer to produce the persisted line); when
/// false, the object is left open-ended for hash computation (callers use
/// `build_payload(block, false)` to get the bytes that get hashed, then
/// append `,"hash":"..","hmac":".."}` themselves - see `ledger.rs`).
pub fn build_payload(block: &ReasonBlock, with_crypto: bool) -> Result<String> {
    if block.formula.len() > 255 {
        return Err(KolibriError::EncodingOverflow {
            what: "formula",
            limit: 255,
        });
    }

    let mut out = String::with_capacity(512);
    let mut first = true;
    out.push('{');

    push_int_field(&mut out, &mut first, "step", block.step);
    push_int_field(&mut out, &mut first, "parent", block.parent);
    push_int_field(&mut out, &mut first, "seed", block.seed);
    push_string_field(&mut out, &mut first, "config_fingerprint", &block.config_fingerprint);
    push_string_field(&mut out, &mut first, "fmt", &block.fmt);
    push_string_field(&mut out, &mut first, "formula", &block.formula);
    push_int_field(&mut out, &mut first, "param_count", block.param_count);
    push_double_array_field(&mut out, &mut first, "params", &block.params);
    push_double_field(&mut out, &mut first, "eff", block.eff);
    push_double_field(&mut out, &mut first, "compl", block.compl);
    push_string_field(&mut out, &mut first, "prev", &block.prev);
    push_double_array_field(&mut out, &mut first, "votes", &block.votes);
    push_double_field(&mut out, &mut first, "vote_softmax", block.vote_softmax);
    push_double_field(&mut out, &mut first, "vote_median", block.vote_median);
    push_double_array_field(&mut out, &mut first, "bench", &block.bench);
    push_string_field(&mut out, &mut first, "memory", &block.memory);
    push_string_field(&mut out, &mut first, "merkle", &block.merkle);
    push_string_field(&mut out, &mut first, "fa", &block.fa);
    push_int_field(&mut out, &mut first, "fa_stab", block.fa_stab);
    push_string_field(&mut out, &mut first, "fa_map", &block.fa_map);
    push_double_field(&mut out, &mut first, "r", block.r);
    push_string_field(&mut out, &mut first, "salt", &block.salt);

    if with_crypto {
        push_string_field(&mut out, &mut first, "hash", &block.hash);
        push_string_field(&mut out, &mut first, "hmac", &block.hmac);
    }

    out.push('}');

    if out.len() > MAX_PAYLOAD_BYTES {
        return Err(KolibriError::EncodingOverflow {
            what: "canonical payload",
            limit: MAX_PAYLOAD_BYTES,
        });
    }

    Ok(out)
}
