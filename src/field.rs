//! Fractal digit field: a fixed-shape 10-ary tree of stateful agents. Each
//! `DigitField` owns its forest outright (§9 "recursive agent trees" -
//! exclusive ownership via `Box`, no shared references, so dropping the
//! field drops every agent in one recursive pass with no cycle risk).

use crate::rng::{splitmix64, unit_from_u64, Xorshift64};

const TICK_NOISE_WEIGHT: f64 = 0.65;
const TICK_CHILD_WEIGHT: f64 = 0.35;
const AGGREGATE_DEPTH_DECAY: f64 = 0.6;
const CHILD_SEED_MIX: u64 = 0xA0761D6478BD642F;

/// A single node in the 10-ary tree.
#[derive(Debug, Clone)]
pub struct DigitAgent {
    pub weight: f64,
    pub seed: u64,
    pub children: Option<Box<[DigitAgent; 10]>>,
}

impl DigitAgent {
    fn build(depth: usize, depth_max: usize, seed: u64) -> DigitAgent {
        let weight = unit_from_u64(splitmix64(seed));
        let children = if depth + 1 < depth_max {
            let mut kids: Vec<DigitAgent> = Vec::with_capacity(10);
            for j in 0..10u64 {
                let child_seed = splitmix64(seed ^ (CHILD_SEED_MIX.wrapping_mul(j + 1)));
                kids.push(DigitAgent::build(depth + 1, depth_max, child_seed));
            }
            let arr: [DigitAgent; 10] = kids.try_into().unwrap_or_else(|_| unreachable!());
            Some(Box::new(arr))
        } else {
            None
        };
        DigitAgent { weight, seed, children }
    }

    /// Post-order tick: advance this agent's own seed/noise, recurse into
    /// children first, then mix.
    fn tick(&mut self) {
        let mut gen = Xorshift64::new(self.seed);
        let next = gen.next_u64();
        let noise = unit_from_u64(next);
        self.seed = next;

        let child_avg = match &mut self.children {
            Some(children) => {
                for c in children.iter_mut() {
                    c.tick();
                }
                let sum: f64 = children.iter().map(|c| c.weight).sum();
                sum / 10.0
            }
            None => noise,
        };

        let updated = TICK_NOISE_WEIGHT * noise + TICK_CHILD_WEIGHT * child_avg;
        self.weight = updated.clamp(0.0, 1.0);
    }

    /// Read-only weighted aggregation with exponential depth decay. Returns
    /// `(weighted_sum, weight_total)`.
    fn aggregate(&self, depth: u32, decay: f64) -> (f64, f64) {
        let w_depth = decay.powi(depth as i32);
        let mut sum = self.weight * w_depth;
        let mut total = w_depth;
        if let Some(children) = &self.children {
            for c in children.iter() {
                let (s, t) = c.aggregate(depth + 1, decay);
                sum += s;
                total += t;
            }
        }
        (sum, total)
    }
}

/// Ten independent root agents forming the field.
#[derive(Debug, Clone)]
pub struct DigitField {
    pub roots: [DigitAgent; 10],
    pub depth_max: usize,
}

impl DigitField {
    /// `init(depth_max, seed)`: derive ten branch seeds via splitmix64 and
    /// build each root subtree.
    pub fn init(depth_max: usize, seed: u64) -> DigitField {
        let depth_max = depth_max.max(1);
        let mut roots: Vec<DigitAgent> = Vec::with_capacity(10);
        for i in 0..10u64 {
            let branch_seed = splitmix64(seed.wrapping_add(i + 1));
            roots.push(DigitAgent::build(0, depth_max, branch_seed));
        }
        DigitField {
            roots: roots.try_into().unwrap_or_else(|_| unreachable!()),
            depth_max,
        }
    }

    /// Advance every agent in the forest by one tick.
    pub fn tick(&mut self) {
        for r in self.roots.iter_mut() {
            r.tick();
        }
    }

    /// Aggregate each root subtree into one vote component, clamped to
    /// `[0,1]`. Does not mutate any agent.
    pub fn aggregate(&self) -> [f64; 10] {
        let mut out = [0.0f64; 10];
        for (i, r) in self.roots.iter().enumerate() {
            let (sum, total) = r.aggregate(0, AGGREGATE_DEPTH_DECAY);
            out[i] = if total > 0.0 { (sum / total).clamp(0.0, 1.0) } else { 0.0 };
        }
        out
    }
}
