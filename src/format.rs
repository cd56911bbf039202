//! Conversions from raw on-chain integers to display strings.
//!
//! Amount formatting never goes through floating point: balances of tokens
//! with 18 decimals routinely exceed what `f64` (or even `u128`) can hold.
//! Floats only appear once a price is involved.

use crate::error::{BalanceError, Result};

const USD_SUFFIXES: [(f64, &str); 6] = [
    (1e18, "Qi"),
    (1e15, "Qa"),
    (1e12, "T"),
    (1e9, "B"),
    (1e6, "M"),
    (1e3, "K"),
];

/// `10^decimals` as a decimal string.
pub fn divisor_for(decimals: u32) -> String {
    let mut divisor = String::with_capacity(decimals as usize + 1);
    divisor.push('1');
    divisor.extend(std::iter::repeat('0').take(decimals as usize));
    divisor
}

/// Render `raw_quantity / divisor` exactly, with trailing zeros trimmed.
///
/// `format_amount("1500000000000000000", "1000000000000000000") == "1.5"`
pub fn format_amount(raw_quantity: &str, divisor: &str) -> Result<String> {
    let raw = raw_quantity.trim();
    if raw.is_empty() || raw == "0" {
        return Ok("0".to_string());
    }
    let digits = normalize_digits(raw)?;
    let divisor = normalize_digits(divisor.trim())?;

    match power_of_ten(divisor) {
        Some(decimals) => Ok(shift_decimal(digits, decimals)),
        None => divide_integer(digits, divisor),
    }
}

/// Checks that `value` is a base-10 integer and strips its leading zeros.
fn normalize_digits(value: &str) -> Result<&str> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BalanceError::InvalidAmount(format!(
            "'{value}' is not a non-negative integer"
        )));
    }
    let stripped = value.trim_start_matches('0');
    Ok(if stripped.is_empty() { "0" } else { stripped })
}

fn power_of_ten(divisor: &str) -> Option<usize> {
    let zeros = divisor.strip_prefix('1')?;
    zeros.bytes().all(|b| b == b'0').then_some(zeros.len())
}

fn shift_decimal(digits: &str, decimals: usize) -> String {
    if decimals == 0 {
        return digits.to_string();
    }
    let (whole, frac) = if digits.len() > decimals {
        digits.split_at(digits.len() - decimals)
    } else {
        ("0", digits)
    };
    let frac = format!("{frac:0>decimals$}");
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{frac}")
    }
}

// Fractional digits kept when a non-power-of-ten divisor does not divide evenly.
const MAX_FRACTION_DIGITS: usize = 36;

// Long division for divisors that are not a power of ten. Terminating
// expansions are exact; the rest are truncated at MAX_FRACTION_DIGITS.
fn divide_integer(digits: &str, divisor: &str) -> Result<String> {
    let value: u128 = digits
        .parse()
        .map_err(|_| BalanceError::InvalidAmount(format!("'{digits}' does not fit in 128 bits")))?;
    let divisor_value: u128 = divisor
        .parse()
        .map_err(|_| BalanceError::InvalidAmount(format!("'{divisor}' does not fit in 128 bits")))?;
    if divisor_value == 0 {
        return Err(BalanceError::InvalidAmount("divisor must be positive".to_string()));
    }

    let whole = value / divisor_value;
    let mut remainder = value % divisor_value;
    let mut frac = String::new();
    while remainder != 0 && frac.len() < MAX_FRACTION_DIGITS {
        let (digit, next) = next_fraction_digit(remainder, divisor_value);
        frac.push(char::from(b'0' + digit));
        remainder = next;
    }

    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        Ok(whole.to_string())
    } else {
        Ok(format!("{whole}.{frac}"))
    }
}

/// `(10 * remainder) / divisor` and its remainder, for `remainder < divisor`.
/// Adds `remainder` ten times modulo `divisor` so nothing overflows.
fn next_fraction_digit(remainder: u128, divisor: u128) -> (u8, u128) {
    let mut digit = 0;
    let mut acc: u128 = 0;
    for _ in 0..10 {
        let headroom = divisor - remainder;
        if acc >= headroom {
            acc -= headroom;
            digit += 1;
        } else {
            acc += remainder;
        }
    }
    (digit, acc)
}

/// USD value of a formatted balance; `0.0` when either side is not a number.
pub fn usd_value(formatted_balance: &str, price_usd: &str) -> f64 {
    match (
        formatted_balance.trim().parse::<f64>(),
        price_usd.trim().parse::<f64>(),
    ) {
        (Ok(balance), Ok(price)) => balance * price,
        _ => 0.0,
    }
}

/// Compact dollar rendering with K/M/B/T/Qa/Qi suffixes from a thousand up.
/// Values under a cent use six decimals, under a millionth scientific notation.
pub fn format_usd(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "$0.00".to_string();
    }

    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();

    let body = if abs < 1e-6 {
        scientific(abs)
    } else if abs < 0.01 {
        format!("{abs:.6}")
    } else {
        match USD_SUFFIXES.iter().find(|(threshold, _)| abs >= *threshold) {
            Some((threshold, suffix)) => format!("{}{}", with_thousands(abs / threshold), suffix),
            None => with_thousands(abs),
        }
    };

    format!("{sign}${body}")
}

/// Two decimals with `,` grouping of the integer part.
fn with_thousands(value: f64) -> String {
    let fixed = format!("{value:.2}");
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{grouped}.{frac_part}")
}

// Rust prints `1.5e-7`; display wants `1.50e-07`.
fn scientific(value: f64) -> String {
    let repr = format!("{value:.2e}");
    match repr.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.abs())
        }
        None => repr,
    }
}
