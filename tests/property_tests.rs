//! Property-based tests covering determinism, chain integrity, and numeric
//! invariants across randomized inputs: P1-P10, P12, P13 as quickcheck
//! generators here; P11 (vote policy idempotence on extremes) is a directed
//! case in `tests/golden_tests.rs` since it names two fixed inputs (all-zero,
//! all-one) rather than a generator-driven range.

use kolibri_core::config::Config;
use kolibri_core::engine::Engine;
use kolibri_core::fa::{encode, prefix_stability};
use kolibri_core::field::DigitField;
use kolibri_core::ledger::{verify, FileLineReader, FileLineWriter, LedgerConfig};
use kolibri_core::numfmt::print_canonical;
use kolibri_core::vote::VotePolicy;

use quickcheck::TestResult;
use quickcheck_macros::quickcheck;

fn temp_path(tag: &str, n: u64) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("kolibri-prop-{}-{}-{}.jsonl", tag, n, std::process::id()))
}

/// P1: identical seed/config produces byte-identical ledger output.
#[quickcheck]
fn prop_determinism_across_seeds(seed: u64, n_steps: u8) -> TestResult {
    if n_steps == 0 || n_steps > 6 {
        return TestResult::discard();
    }
    let mut cfg = Config::default();
    cfg.seed = seed;

    let path_a = temp_path("det-a", seed);
    let path_b = temp_path("det-b", seed);
    {
        let mut engine_a = Engine::new(cfg.clone());
        let mut engine_b = Engine::new(cfg);
        let mut writer_a = FileLineWriter::create(&path_a).unwrap();
        let mut writer_b = FileLineWriter::create(&path_b).unwrap();
        for _ in 0..n_steps {
            engine_a.step(&mut writer_a).unwrap();
            engine_b.step(&mut writer_b).unwrap();
        }
    }
    let a = std::fs::read_to_string(&path_a).unwrap();
    let b = std::fs::read_to_string(&path_b).unwrap();
    std::fs::remove_file(&path_a).ok();
    std::fs::remove_file(&path_b).ok();
    TestResult::from_bool(a == b)
}

/// P2/P3/P4/P5: every appended chain verifies end-to-end, with or without
/// an HMAC key - `ledger::verify` itself checks chain link (P2), hash
/// integrity (P3), HMAC integrity (P4), and step/parent monotonicity (P5)
/// in a single pass, so a chain that was honestly constructed must satisfy
/// all four or this fails.
#[quickcheck]
fn prop_chain_verifies_with_and_without_hmac(seed: u64, n_steps: u8, use_key: bool) -> TestResult {
    if n_steps == 0 || n_steps > 6 {
        return TestResult::discard();
    }
    let mut cfg = Config::default();
    cfg.seed = seed;
    if use_key {
        cfg.hmac_key = "property-test-key".to_string();
    }

    let path = temp_path("verify", seed ^ (n_steps as u64) ^ (use_key as u64));
    {
        let mut engine = Engine::new(cfg);
        let mut writer = FileLineWriter::create(&path).unwrap();
        for _ in 0..n_steps {
            engine.step(&mut writer).unwrap();
        }
    }
    let key = if use_key { "property-test-key" } else { "" };
    let mut reader = FileLineReader::open(&path);
    let result = verify(&mut reader, &LedgerConfig::new(key, ""));
    std::fs::remove_file(&path).ok();
    TestResult::from_bool(result.is_ok())
}

/// P6/P7: flipping any byte in a non-trivial line breaks verification, and
/// verifying with the wrong HMAC key also fails.
#[quickcheck]
fn prop_tamper_and_wrong_key_always_detected(seed: u64, flip_index: u8) -> TestResult {
    let mut cfg = Config::default();
    cfg.seed = seed;
    cfg.hmac_key = "right-key".to_string();

    let path = temp_path("tamper", seed);
    {
        let mut engine = Engine::new(cfg);
        let mut writer = FileLineWriter::create(&path).unwrap();
        for _ in 0..3 {
            engine.step(&mut writer).unwrap();
        }
    }

    let mut reader_wrong_key = FileLineReader::open(&path);
    let wrong_key_result = verify(&mut reader_wrong_key, &LedgerConfig::new("wrong-key", ""));

    let contents = std::fs::read_to_string(&path).unwrap();
    let mut lines: Vec<String> = contents.lines().map(|s| s.to_string()).collect();
    let mut bytes = lines[1].clone().into_bytes();
    if bytes.is_empty() {
        std::fs::remove_file(&path).ok();
        return TestResult::discard();
    }
    let idx = (flip_index as usize) % bytes.len();
    bytes[idx] ^= 0x01;
    lines[1] = String::from_utf8_lossy(&bytes).to_string();
    std::fs::write(&path, format!("{}\n", lines.join("\n"))).unwrap();

    let mut reader_tampered = FileLineReader::open(&path);
    let tampered_result = verify(&mut reader_tampered, &LedgerConfig::new("right-key", ""));
    std::fs::remove_file(&path).ok();

    TestResult::from_bool(wrong_key_result.is_err() && tampered_result.is_err())
}

/// Supplementary: the config fingerprint changes whenever one of its eight
/// fingerprinted numeric knobs changes (the converse of P8's constancy
/// claim - spec.md §8 does not number this directly, but it is the
/// fingerprint's whole reason to exist).
#[quickcheck]
fn prop_fingerprint_changes_with_quorum(quorum_bits: u16) -> TestResult {
    let quorum = (quorum_bits as f64) / (u16::MAX as f64);
    let base = Config::default();
    let mut changed = base.clone();
    changed.quorum = quorum;

    if (changed.quorum - base.quorum).abs() < 1e-12 {
        return TestResult::discard();
    }
    TestResult::from_bool(base.fingerprint() != changed.fingerprint())
}

/// P8: every block written within a single run carries the identical
/// `config_fingerprint`, since the config is loaded once and frozen for the
/// engine's lifetime (§3 "Lifecycles").
#[quickcheck]
fn prop_fingerprint_constant_across_a_run(seed: u64, n_steps: u8) -> TestResult {
    if n_steps < 2 || n_steps > 8 {
        return TestResult::discard();
    }
    let mut cfg = Config::default();
    cfg.seed = seed;
    let mut engine = Engine::new(cfg);
    let path = temp_path("fp-const", seed);
    let fingerprints: Vec<String> = {
        let mut writer = FileLineWriter::create(&path).unwrap();
        (0..n_steps)
            .map(|_| engine.step(&mut writer).unwrap().config_fingerprint)
            .collect()
    };
    std::fs::remove_file(&path).ok();
    let first = &fingerprints[0];
    TestResult::from_bool(fingerprints.iter().all(|f| f == first))
}

/// P9: `fa[i]` equals `round(9*clamp01(votes[i]))` for every digit, which
/// also implies the string is always exactly 10 ASCII digits.
#[quickcheck]
fn prop_fa_matches_formula_and_is_ten_digits(raw: Vec<u16>) -> TestResult {
    if raw.len() < 10 {
        return TestResult::discard();
    }
    let mut votes = [0.0f64; 10];
    for i in 0..10 {
        votes[i] = (raw[i] as f64) / (u16::MAX as f64);
    }
    let fa = encode(&votes);
    if fa.len() != 10 || !fa.chars().all(|c| c.is_ascii_digit()) {
        return TestResult::failed();
    }
    let matches_formula = fa.chars().zip(votes.iter()).all(|(c, &v)| {
        let expected = (9.0 * v.clamp(0.0, 1.0)).round() as u32;
        c.to_digit(10) == Some(expected)
    });
    TestResult::from_bool(matches_formula)
}

/// P10: prefix stability never exceeds the reference string's own length,
/// and never exceeds 10.
#[quickcheck]
fn prop_prefix_stability_bounded(a: u32, b: u32, c: u32) -> bool {
    let mk = |v: u32| -> String {
        let votes: [f64; 10] = std::array::from_fn(|i| {
            (((v >> (i % 32)) & 0xFF) as f64) / 255.0
        });
        encode(&votes)
    };
    let window = vec![mk(a), mk(b), mk(c)];
    let s = prefix_stability(&window);
    s <= 10
}

/// Supplementary: the vote policy never produces a vote outside `[0,1]`
/// regardless of input (even out-of-range raw votes, which `apply` clamps
/// first) - not itself one of spec.md §8's numbered properties, but the
/// invariant P13 relies on downstream of `DigitField::aggregate`.
#[quickcheck]
fn prop_vote_policy_output_always_bounded(
    raw: Vec<i32>,
    depth_decay_bits: u8,
    quorum_bits: u8,
    temperature_bits: u8,
) -> TestResult {
    if raw.len() < 10 {
        return TestResult::discard();
    }
    let mut votes = [0.0f64; 10];
    for i in 0..10 {
        votes[i] = (raw[i] as f64) / 1000.0;
    }
    let policy = VotePolicy {
        depth_decay: (depth_decay_bits as f64) / 255.0,
        quorum: (quorum_bits as f64) / 255.0,
        temperature: (temperature_bits as f64) / 255.0,
    };
    let out = policy.apply(votes);
    TestResult::from_bool(out.iter().all(|v| (0.0..=1.0).contains(v)))
}

/// P12: the canonical number printer always produces output that reparses
/// to the original finite double.
#[quickcheck]
fn prop_canonical_number_round_trips(bits: u64) -> TestResult {
    let v = f64::from_bits(bits);
    if !v.is_finite() {
        return TestResult::discard();
    }
    let printed = print_canonical(v);
    match printed.parse::<f64>() {
        Ok(parsed) => TestResult::from_bool(parsed == v),
        Err(_) => TestResult::failed(),
    }
}

#[derive(Clone, Debug)]
struct UnitVotes([f64; 10]);

impl quickcheck::Arbitrary for UnitVotes {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let mut v = [0.0f64; 10];
        for x in v.iter_mut() {
            *x = (u16::arbitrary(g) as f64) / (u16::MAX as f64);
        }
        UnitVotes(v)
    }
}

/// Supplementary: feeding already-bounded (unit-range) votes through the
/// policy preserves boundedness, for arbitrary vote vectors rather than
/// just the all-zero/all-one extremes P11 checks.
#[quickcheck]
fn prop_policy_preserves_boundedness_of_unit_votes(votes: UnitVotes) -> bool {
    let policy = VotePolicy {
        depth_decay: 0.7,
        quorum: 0.6,
        temperature: 0.15,
    };
    let out = policy.apply(votes.0);
    out.iter().all(|v| (0.0..=1.0).contains(v))
}

/// P13: `DigitField::aggregate` returns each component in `[0,1]`, for
/// arbitrary seeds and depths and after an arbitrary number of ticks.
#[quickcheck]
fn prop_aggregate_output_always_bounded(seed: u64, depth_max_bits: u8, n_ticks: u8) -> TestResult {
    let depth_max = (depth_max_bits % 4) as usize + 1;
    if n_ticks > 12 {
        return TestResult::discard();
    }
    let mut field = DigitField::init(depth_max, seed);
    for _ in 0..n_ticks {
        field.tick();
    }
    let out = field.aggregate();
    TestResult::from_bool(out.iter().all(|v| (0.0..=1.0).contains(v)))
}
