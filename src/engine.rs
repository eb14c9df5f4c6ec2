//! The step engine: the one stateful object in the core. Owns the digit
//! field, the prev-hash/prev-merkle cache, and the step counter for the
//! process lifetime (§9 "Global mutable state" - no statics, one `Engine`).

use crate::bench::{bench_vector, first_bench_grid, BENCH_NAMES};
use crate::config::Config;
use crate::dsl::Node;
use crate::errors::Result;
use crate::fa::{encode, FractalMap};
use crate::field::DigitField;
use crate::fit::{fit, mse};
use crate::hash::sha256;
use crate::ledger::{compute_digests, LineWriter};
use crate::numfmt::print_canonical;
use crate::payload::{build_payload, ReasonBlock};
use crate::rng::Xorshift64;
use crate::vote::{vote_median, vote_softmax, VotePolicy};

fn zero_hash64() -> String {
    "0".repeat(64)
}

/// The reasoning core's single stateful object. One `Engine` per process; a
/// tick either completes and is persisted or fails and leaves every cached
/// field untouched (§5: no partial record is ever flushed).
pub struct Engine {
    cfg: Config,
    field: DigitField,
    fractal_map: Option<FractalMap>,
    step_counter: u64,
    prev_hash: String,
    prev_merkle: String,
    fa_window: Vec<String>,
}

impl Engine {
    /// Build a fresh engine from a loaded configuration. `step_counter`
    /// starts at `1` per the `block[0].step = 1, parent = 0` convention.
    pub fn new(cfg: Config) -> Engine {
        let depth_max = cfg.depth_max.max(1) as usize;
        let field = DigitField::init(depth_max, cfg.seed);
        Engine {
            cfg,
            field,
            fractal_map: Some(FractalMap::default_v1()),
            step_counter: 1,
            prev_hash: String::new(),
            prev_merkle: zero_hash64(),
            fa_window: Vec::new(),
        }
    }

    /// Run a single tick: field.tick() -> aggregate -> vote policy -> FA ->
    /// propose -> fit -> evaluate -> assemble -> merkle -> hash/hmac ->
    /// append (§4.7). Returns the appended block. A failure leaves every
    /// cached field (`prev_hash`, `prev_merkle`, `step_counter`, the field
    /// itself) exactly as it was before the call.
    pub fn step(&mut self, writer: &mut dyn LineWriter) -> Result<ReasonBlock> {
        let s = self.step_counter;
        let seed_s = self.cfg.seed ^ s;

        self.field.tick();
        let raw_votes = self.field.aggregate();
        let policy = VotePolicy::from_config(&self.cfg);
        let votes = policy.apply(raw_votes);

        let softmax = vote_softmax(&votes, self.cfg.temperature);
        let median = vote_median(&votes);

        let fa = encode(&votes);
        let formula_node = propose_expression(seed_s, &votes, &fa, self.fractal_map.as_ref());

        self.fa_window.push(fa.clone());
        if self.fa_window.len() > 16 {
            self.fa_window.remove(0);
        }
        let fa_stab = crate::fa::prefix_stability(&self.fa_window);

        let param_count = formula_node.max_param_index().map(|i| i as usize + 1).unwrap_or(0);
        let grid = first_bench_grid();
        let params = fit(&formula_node, param_count, &grid);
        let first_mse = mse(&formula_node, &params, &grid);
        let eff = 1.0 / (1.0 + first_mse);
        let compl = formula_node.complexity() as f64;

        let bench = bench_vector(&formula_node, &params);

        let formula = formula_node.render()?;
        let memory = format!("top:{}|eff={}", truncate_bytes(&formula, 240), print_canonical(eff));

        let fractal_map_id = self
            .fractal_map
            .as_ref()
            .map(|m| m.id.clone())
            .unwrap_or_else(|| "none".to_string());
        let fractal_r = self.fractal_map.as_ref().map(|m| m.r).unwrap_or(0.0);

        let mut block = ReasonBlock {
            step: s,
            parent: s.saturating_sub(1),
            seed: seed_s,
            config_fingerprint: self.cfg.fingerprint(),
            fmt: "v1".to_string(),
            formula,
            param_count: param_count as u8,
            params,
            eff,
            compl,
            prev: self.prev_hash.clone(),
            votes,
            vote_softmax: softmax,
            vote_median: median,
            bench,
            memory,
            merkle: zero_hash64(),
            fa,
            fa_stab,
            fa_map: fractal_map_id,
            r: fractal_r,
            salt: self.cfg.salt.clone(),
            hash: String::new(),
            hmac: String::new(),
        };

        // Merkle is self-referential in the wire format: hash the payload
        // with the placeholder merkle value, then splice the real one in.
        let placeholder_payload = build_payload(&block, false)?;
        let merkle_bytes = sha256(
            format!("{}{}", self.prev_merkle, placeholder_payload).as_bytes(),
        );
        block.merkle = hex::encode(merkle_bytes);

        let (hash, hmac) = compute_digests(&block, &self.cfg.hmac_key)?;
        block.hash = hash.clone();
        block.hmac = hmac;

        crate::ledger::append(writer, &block)?;

        self.prev_hash = block.hash.clone();
        self.prev_merkle = block.merkle.clone();
        self.step_counter += 1;

        tracing::debug!(step = block.step, eff = block.eff, fa = %block.fa, "tick complete");
        Ok(block)
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn current_step(&self) -> u64 {
        self.step_counter
    }
}

fn truncate_bytes(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Six deterministic expression variants, selected by `floor(unit(seed_s)*6)`
/// (§4.7 step 7). Each variant derives its own constants from `seed_s` so
/// repeated ticks with the same seed always propose the same formula. The
/// FA transform pipeline, when present, contributes an additive correction
/// built from the same votes that produced `fa` (§4.5) rather than the
/// fixed variant skeleton alone.
fn propose_expression(seed_s: u64, votes: &[f64; 10], fa: &str, map: Option<&FractalMap>) -> Node {
    let mut gen = Xorshift64::new(seed_s);
    let variant = (gen.unit() * 6.0).floor().clamp(0.0, 5.0) as u32;
    let vote_bias = votes.iter().sum::<f64>() / votes.len() as f64;

    let base = match variant {
        0 => Node::add(Node::VarX, Node::sin(Node::VarX)),
        1 => {
            let c = 0.5 + 2.0 * gen.unit() + vote_bias;
            Node::sin(Node::mul(Node::Const(c), Node::VarX))
        }
        2 => Node::add(
            Node::mul(Node::Param(0), Node::sin(Node::VarX)),
            Node::mul(Node::Param(1), Node::VarX),
        ),
        3 => Node::Const(vote_bias),
        4 => Node::mul(Node::Param(0), Node::tanh(Node::VarX)),
        _ => Node::add(
            Node::mul(Node::Param(0), Node::VarX),
            Node::mul(Node::Param(1), Node::cos(Node::VarX)),
        ),
    };

    const FA_CORRECTION_WEIGHT: f64 = 0.1;
    match map {
        Some(m) => {
            let correction = FractalMap::build_formula(fa, Some(m));
            Node::add(base, Node::mul(Node::Const(FA_CORRECTION_WEIGHT), correction))
        }
        None => base,
    }
}
