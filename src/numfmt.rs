//! Canonical number formatting: a `%.17g`-equivalent double printer, always
//! in the C locale (period decimal, no grouping), with `-0` normalized to
//! `0`. This is what every field in the canonical payload (§6) and the
//! config fingerprint (§4.9) goes through - two conforming implementations
//! must print the same double to the same bytes.

/// Print `value` the way C's `printf("%.17g", value)` would: up to 17
/// significant decimal digits, switching between fixed and scientific
/// notation by the same magnitude rule as `%g`, with trailing insignificant
/// zeros stripped. `-0.0` prints as `"0"`.
pub fn print_canonical(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let precision = 17usize;
    let exp10 = value.abs().log10().floor() as i32;

    // %g: scientific when exponent < -4 or >= precision, else fixed.
    let s = if exp10 < -4 || exp10 >= precision as i32 {
        format_scientific(value, precision)
    } else {
        format_fixed(value, precision, exp10)
    };

    if s == "-0" {
        "0".to_string()
    } else {
        s
    }
}

fn strip_trailing_zeros(mantissa: &str) -> String {
    if !mantissa.contains('.') {
        return mantissa.to_string();
    }
    let trimmed = mantissa.trim_end_matches('0');
    let trimmed = trimmed.trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn format_fixed(value: f64, precision: usize, exp10: i32) -> String {
    // Significant digits after the leading digit: precision - 1 - exp10,
    // clamped to a sane non-negative range for the `{:.*}` formatter.
    let decimals = (precision as i32 - 1 - exp10).max(0) as usize;
    let s = format!("{:.*}", decimals, value);
    strip_trailing_zeros(&s)
}

fn format_scientific(value: f64, precision: usize) -> String {
    let s = format!("{:.*e}", precision - 1, value);
    // Rust renders as `d.dddde<exp>`; %g wants `d.ddde[+-]dd` with no
    // leading zero padding requirement for our purposes, and a mandatory
    // sign only for negative exponents (C's %g omits the '+').
    let (mantissa, exp) = s.split_once('e').expect("scientific notation has an e");
    let mantissa = strip_trailing_zeros(mantissa);
    let exp_val: i32 = exp.parse().expect("valid exponent");
    format!("{}e{}{:02}", mantissa, if exp_val < 0 { "-" } else { "+" }, exp_val.abs())
}
