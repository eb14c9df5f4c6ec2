//! Fractal Address (FA) codec: votes as a 10-digit ASCII string, prefix
//! stability over a sliding window, and an optional digit-indexed transform
//! pipeline (`FractalMap`) that biases expression construction.

use serde::Deserialize;

use crate::dsl::Node;
use crate::errors::{KolibriError, Result};

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Encode a vote vector into a 10-character ASCII digit string:
/// `digit_i = round(9 * clamp01(v_i))`.
pub fn encode(votes: &[f64; 10]) -> String {
    let mut s = String::with_capacity(10);
    for &v in votes {
        let scaled = (9.0 * clamp01(v)).round().clamp(0.0, 9.0);
        s.push((b'0' + scaled as u8) as char);
    }
    s
}

/// Longest common prefix length over `window`, using the most-recent entry
/// (the last one) as the reference: the minimum, over every other entry, of
/// how many leading characters match the reference. Bounded to `[0,10]`.
pub fn prefix_stability(window: &[String]) -> u8 {
    let Some(reference) = window.last() else {
        return 0;
    };
    let ref_chars: Vec<char> = reference.chars().collect();
    let mut min_match = ref_chars.len().min(10);
    for entry in &window[..window.len().saturating_sub(1)] {
        let entry_chars: Vec<char> = entry.chars().collect();
        let mut matched = 0usize;
        while matched < min_match
            && matched < entry_chars.len()
            && entry_chars[matched] == ref_chars[matched]
        {
            matched += 1;
        }
        min_match = min_match.min(matched);
    }
    min_match as u8
}

/// One digit-indexed transform applied at a given tree level, scaled by
/// `r^level`.
#[derive(Debug, Clone, PartialEq)]
pub struct FractalMap {
    pub id: String,
    pub r: f64,
    pub coeff_sin_a: f64,
    pub coeff_sin_omega: f64,
    pub coeff_linear: f64,
    pub coeff_quadratic: f64,
    pub coeff_tanh: f64,
    pub coeff_exp_amp: f64,
    pub coeff_exp_gamma: f64,
    pub coeff_log_eps: f64,
    pub coeff_mix_sin: f64,
    pub coeff_mix_cos: f64,
    pub coeff_mix_phi: f64,
    pub coeff_pow_amp: f64,
    pub coeff_pow_exp: f64,
    pub coeff_reduce: f64,
}

impl FractalMap {
    /// The built-in default coefficient set (`default_v1`).
    pub fn default_v1() -> FractalMap {
        FractalMap {
            id: "default_v1".to_string(),
            r: 0.5,
            coeff_sin_a: 0.8,
            coeff_sin_omega: std::f64::consts::FRAC_PI_2,
            coeff_linear: 0.6,
            coeff_quadratic: 0.4,
            coeff_tanh: 1.0,
            coeff_exp_amp: 0.35,
            coeff_exp_gamma: 0.5,
            coeff_log_eps: 1e-3,
            coeff_mix_sin: 0.25,
            coeff_mix_cos: 0.2,
            coeff_mix_phi: std::f64::consts::FRAC_PI_3,
            coeff_pow_amp: 0.2,
            coeff_pow_exp: 2.2,
            coeff_reduce: 0.85,
        }
    }

    /// Load a coefficient override from a JSON file, falling back to
    /// `default_v1` field-by-field for anything the file omits (mirrors
    /// `fractal_map_load`'s "start from defaults, overwrite what's present"
    /// shape). Out-of-range values are clamped back to sane defaults the
    /// same way the reference loader does: `coeff_log_eps` floored at
    /// `1e-9`, `coeff_reduce` reset to `0.85` outside `(0,1]`, `r` reset to
    /// `0.5` when non-positive.
    pub fn load_from_file(path: &std::path::Path) -> Result<FractalMap> {
        let text = std::fs::read_to_string(path)?;
        let overrides: FractalMapOverride = serde_json::from_str(&text).map_err(|e| KolibriError::ConfigParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut map = FractalMap::default_v1();
        overrides.apply_onto(&mut map);

        if map.coeff_log_eps < 1e-9 {
            map.coeff_log_eps = 1e-9;
        }
        if map.coeff_reduce <= 0.0 || map.coeff_reduce > 1.0 {
            map.coeff_reduce = 0.85;
        }
        if map.r <= 0.0 {
            map.r = 0.5;
        }
        if map.id.is_empty() {
            map.id = "default_v1".to_string();
        }
        Ok(map)
    }

    fn level_scale(&self, level: usize) -> f64 {
        let r = if self.r <= 0.0 { 0.5 } else { self.r };
        r.powi(level as i32)
    }

    /// Build a formula by walking the FA's digits left to right, applying
    /// the digit-indexed op at each position to the formula built so far.
    /// Digit `0` is the identity; a missing map (`None`) is the identity for
    /// every position, so the formula is chosen solely by PRNG and votes.
    pub fn build_formula(fa: &str, map: Option<&FractalMap>) -> Node {
        let mut current = Node::VarX;
        let Some(map) = map else {
            return current;
        };
        for (level, ch) in fa.chars().take(10).enumerate() {
            let Some(digit) = ch.to_digit(10) else {
                continue;
            };
            current = map.apply_digit(digit, current, level);
        }
        current
    }

    fn apply_digit(&self, digit: u32, current: Node, level: usize) -> Node {
        let scale = self.level_scale(level);
        match digit {
            0 => current,
            1 => {
                let amp = self.coeff_sin_a * scale;
                let omega = self.coeff_sin_omega * scale;
                let arg = Node::mul(Node::Const(omega), Node::VarX);
                Node::add(current, Node::mul(Node::Const(amp), Node::sin(arg)))
            }
            2 => {
                let coeff = self.coeff_linear * scale;
                Node::add(current, Node::mul(Node::Const(coeff), Node::VarX))
            }
            3 => {
                let coeff = self.coeff_quadratic * scale;
                let x2 = Node::mul(Node::VarX, Node::VarX);
                Node::add(current, Node::mul(Node::Const(coeff), x2))
            }
            4 => {
                let kappa = self.coeff_tanh * scale;
                Node::tanh(Node::mul(Node::Const(kappa), current))
            }
            5 => {
                let amp = self.coeff_exp_amp * scale;
                let gamma = self.coeff_exp_gamma * scale;
                let x2 = Node::mul(Node::VarX, Node::VarX);
                let inner = Node::mul(Node::Const(-gamma), x2);
                Node::add(current, Node::mul(Node::Const(amp), Node::exp(inner)))
            }
            6 => {
                let eps = (self.coeff_log_eps * scale).max(1e-9);
                let shifted = Node::add(Node::Const(eps), Node::abs(current));
                Node::log(shifted)
            }
            7 => {
                let phi = self.coeff_mix_phi * scale;
                let sin_arg = Node::mul(Node::Const(phi), Node::VarX);
                let cos_arg = Node::mul(Node::Const(phi), Node::VarX);
                let sin_term = Node::mul(Node::Const(self.coeff_mix_sin * scale), Node::sin(sin_arg));
                let cos_term = Node::mul(Node::Const(self.coeff_mix_cos * scale), Node::cos(cos_arg));
                Node::add(current, Node::add(sin_term, cos_term))
            }
            8 => {
                let amp = self.coeff_pow_amp * scale;
                let exponent = (self.coeff_pow_exp * scale).max(0.5);
                let magnitude = Node::add(Node::abs(Node::VarX), Node::Const(1e-3));
                let pow_term = Node::pow(magnitude, Node::Const(exponent));
                Node::add(current, Node::mul(Node::Const(amp), pow_term))
            }
            9 => {
                let factor = self.coeff_reduce + (1.0 - self.coeff_reduce) * (1.0 - scale);
                Node::mul(Node::Const(factor), current)
            }
            _ => current,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct FractalMapOverride {
    id: Option<String>,
    r: Option<f64>,
    coeff_sin_a: Option<f64>,
    coeff_sin_omega: Option<f64>,
    coeff_linear: Option<f64>,
    coeff_quadratic: Option<f64>,
    coeff_tanh: Option<f64>,
    coeff_exp_amp: Option<f64>,
    coeff_exp_gamma: Option<f64>,
    coeff_log_eps: Option<f64>,
    coeff_mix_sin: Option<f64>,
    coeff_mix_cos: Option<f64>,
    coeff_mix_phi: Option<f64>,
    coeff_pow_amp: Option<f64>,
    coeff_pow_exp: Option<f64>,
    coeff_reduce: Option<f64>,
}

impl FractalMapOverride {
    fn apply_onto(self, map: &mut FractalMap) {
        if let Some(v) = self.id {
            map.id = v;
        }
        if let Some(v) = self.r {
            map.r = v;
        }
        if let Some(v) = self.coeff_sin_a {
            map.coeff_sin_a = v;
        }
        if let Some(v) = self.coeff_sin_omega {
            map.coeff_sin_omega = v;
        }
        if let Some(v) = self.coeff_linear {
            map.coeff_linear = v;
        }
        if let Some(v) = self.coeff_quadratic {
            map.coeff_quadratic = v;
        }
        if let Some(v) = self.coeff_tanh {
            map.coeff_tanh = v;
        }
        if let Some(v) = self.coeff_exp_amp {
            map.coeff_exp_amp = v;
        }
        if let Some(v) = self.coeff_exp_gamma {
            map.coeff_exp_gamma = v;
        }
        if let Some(v) = self.coeff_log_eps {
            map.coeff_log_eps = v;
        }
        if let Some(v) = self.coeff_mix_sin {
            map.coeff_mix_sin = v;
        }
        if let Some(v) = self.coeff_mix_cos {
            map.coeff_mix_cos = v;
        }
        if let Some(v) = self.coeff_mix_phi {
            map.coeff_mix_phi = v;
        }
        if let Some(v) = self.coeff_pow_amp {
            map.coeff_pow_amp = v;
        }
        if let Some(v) = self.coeff_pow_exp {
            map.coeff_pow_exp = v;
        }
        if let Some(v) = self.coeff_reduce {
            map.coeff_reduce = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s4_fa_encoding_ramp() {
        let votes = [0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];
        assert_eq!(encode(&votes), "0123456789");
    }

    #[test]
    fn test_s4_fa_encoding_mixed() {
        let votes = [0.05, 0.15, 0.95, 0.33, 0.51, 0.72, 0.41, 0.08, 0.67, 0.2];
        assert_eq!(encode(&votes), "0193564162");
    }

    #[test]
    fn test_s5_prefix_stability() {
        let window = vec![
            "7056172034".to_string(),
            "7056172031".to_string(),
            "7056179034".to_string(),
            "7056172034".to_string(),
            "7056172034".to_string(),
        ];
        assert_eq!(prefix_stability(&window), 6);
    }

    #[test]
    fn test_prefix_stability_bounded() {
        let window = vec!["0000000000".to_string(), "1111111111".to_string()];
        let s = prefix_stability(&window);
        assert!(s <= 10);
    }

    #[test]
    fn test_prefix_stability_empty_window() {
        assert_eq!(prefix_stability(&[]), 0);
    }

    #[test]
    fn test_missing_map_is_identity() {
        let f = FractalMap::build_formula("5555555555", None);
        assert_eq!(f, Node::VarX);
    }

    #[test]
    fn test_digit_zero_is_identity() {
        let map = FractalMap::default_v1();
        let f = FractalMap::build_formula("0000000000", Some(&map));
        assert_eq!(f, Node::VarX);
    }

    #[test]
    fn test_nonzero_digit_grows_formula() {
        let map = FractalMap::default_v1();
        let f = FractalMap::build_formula("1000000000", Some(&map));
        assert!(f.complexity() > Node::VarX.complexity());
    }

    #[test]
    fn test_load_from_file_overrides_only_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        std::fs::write(&path, r#"{"id":"custom","coeff_sin_a":1.5}"#).unwrap();

        let map = FractalMap::load_from_file(&path).unwrap();
        assert_eq!(map.id, "custom");
        assert_eq!(map.coeff_sin_a, 1.5);
        assert_eq!(map.coeff_linear, FractalMap::default_v1().coeff_linear);
    }

    #[test]
    fn test_load_from_file_sanitizes_out_of_range_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        std::fs::write(&path, r#"{"coeff_log_eps":1e-20,"coeff_reduce":5.0,"r":-1.0}"#).unwrap();

        let map = FractalMap::load_from_file(&path).unwrap();
        assert_eq!(map.coeff_log_eps, 1e-9);
        assert_eq!(map.coeff_reduce, 0.85);
        assert_eq!(map.r, 0.5);
    }

    #[test]
    fn test_load_from_file_missing_file_errors() {
        let result = FractalMap::load_from_file(std::path::Path::new("/nonexistent/map.json"));
        assert!(result.is_err());
    }
}
