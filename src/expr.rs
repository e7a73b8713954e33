//! # Expr — Numeric and Range Expression Parsing
//!
//! The CLI boundary accepts human-friendly integer expressions; the engine
//! itself only ever sees parsed big integers. Grammar:
//!
//! ```text
//! Expr    := Term ('+' Term)*
//! Term    := Decimal | Decimal '^' Decimal | Decimal ('e'|'E') Decimal
//! Decimal := digits | digits(,digits)+    (groups of 3 after the first 1–3)
//! ```
//!
//! `10^6`, `1e6`, `1,000,000` and `10e100 + 10e9` all parse; underscores are
//! accepted as digit separators where commas are not used. Range expressions
//! come in five spellings: `L,R`, `[L,R]`, `range[L,R]`, `L..R`, `L:R`, all
//! requiring L ≤ R.

use anyhow::{bail, ensure, Context, Result};
use rug::ops::Pow;
use rug::{Complete, Integer};

fn normalize_decimal_token(token: &str) -> Result<String> {
    let token = token.trim();
    let token = token.strip_prefix('+').unwrap_or(token);
    ensure!(!token.is_empty(), "empty numeric token");

    let mut normalized = String::with_capacity(token.len());

    if !token.contains(',') {
        for c in token.chars() {
            if c == '_' {
                continue;
            }
            ensure!(c.is_ascii_digit(), "invalid character {:?} in numeric token", c);
            normalized.push(c);
        }
        ensure!(!normalized.is_empty(), "numeric token has no digits");
        return Ok(normalized);
    }

    // comma-grouped: 1–3 digits, then exact groups of 3
    for (idx, group) in token.split(',').enumerate() {
        let valid_len = if idx == 0 {
            (1..=3).contains(&group.len())
        } else {
            group.len() == 3
        };
        ensure!(
            valid_len && group.chars().all(|c| c.is_ascii_digit()),
            "malformed digit grouping in {:?}",
            token
        );
        normalized.push_str(group);
    }

    Ok(normalized)
}

fn parse_integer_token(token: &str) -> Result<Integer> {
    let normalized = normalize_decimal_token(token)?;
    Integer::parse(&normalized)
        .map(|v| v.complete())
        .with_context(|| format!("invalid decimal token {:?}", token))
}

fn parse_exponent(token: &str) -> Result<u32> {
    let value = parse_integer_token(token)?;
    value
        .to_u32()
        .with_context(|| format!("exponent {:?} out of range", token))
}

fn parse_term(term: &str) -> Result<Integer> {
    let term = term.trim();
    ensure!(!term.is_empty(), "empty term in numeric expression");

    let pow_op = term.find('^');
    let sci_op = term.find(['e', 'E']);

    match (pow_op, sci_op) {
        (Some(_), Some(_)) => bail!("term {:?} mixes '^' and scientific notation", term),
        (Some(pos), None) => {
            let (base, exp) = (&term[..pos], &term[pos + 1..]);
            ensure!(
                !exp.contains(['^', 'e', 'E']),
                "term {:?} has more than one operator",
                term
            );
            let base = parse_integer_token(base)?;
            let exp = parse_exponent(exp)?;
            Ok(base.pow(exp))
        }
        (None, Some(pos)) => {
            let (base, exp) = (&term[..pos], &term[pos + 1..]);
            ensure!(
                !exp.contains(['^', 'e', 'E']),
                "term {:?} has more than one operator",
                term
            );
            let base = parse_integer_token(base)?;
            let exp = parse_exponent(exp)?;
            Ok(base * Integer::u_pow_u(10, exp).complete())
        }
        (None, None) => parse_integer_token(term),
    }
}

/// Parse a numeric expression into an arbitrary-precision integer.
pub fn parse_numeric_expr(expr: &str) -> Result<Integer> {
    let expr = expr.trim();
    ensure!(!expr.is_empty(), "empty numeric expression");

    let mut sum = Integer::new();
    for term in expr.split('+') {
        sum += parse_term(term)?;
    }
    Ok(sum)
}

/// Parse a numeric expression that must fit an unsigned 64-bit value.
pub fn parse_numeric_expr_u64(expr: &str) -> Result<u64> {
    let value = parse_numeric_expr(expr)?;
    value
        .to_u64()
        .with_context(|| format!("expression {:?} does not fit 64 bits", expr))
}

/// Parse an inclusive range expression into its (lower, upper) bounds.
///
/// Accepts `L,R`, `[L,R]`, `range[L,R]`, `L..R`, and `L:R`; both sides are
/// full numeric expressions and L ≤ R is required.
pub fn parse_inclusive_range(expr: &str) -> Result<(Integer, Integer)> {
    let mut range = expr.trim();
    ensure!(!range.is_empty(), "empty range expression");

    if let Some(inner) = range.strip_prefix("range[").and_then(|r| r.strip_suffix(']')) {
        range = inner;
    }
    if let Some(inner) = range.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        range = inner;
    }

    if let Some((left, right)) = range.split_once("..") {
        return parse_range_parts(left, right);
    }
    if let Some((left, right)) = range.split_once(':') {
        return parse_range_parts(left, right);
    }

    // comma is ambiguous with digit grouping: try every split point
    for (pos, _) in range.match_indices(',') {
        if let Ok(bounds) = parse_range_parts(&range[..pos], &range[pos + 1..]) {
            return Ok(bounds);
        }
    }

    bail!("unrecognized range expression {:?}", expr);
}

fn parse_range_parts(left: &str, right: &str) -> Result<(Integer, Integer)> {
    let lower = parse_numeric_expr(left)?;
    let upper = parse_numeric_expr(right)?;
    ensure!(upper >= lower, "range upper bound below lower bound");
    Ok((lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(expr: &str) -> Integer {
        parse_numeric_expr(expr).unwrap()
    }

    #[test]
    fn plain_decimals() {
        assert_eq!(num("0"), 0);
        assert_eq!(num("42"), 42);
        assert_eq!(num("1_000_000"), 1_000_000);
    }

    #[test]
    fn comma_grouping() {
        assert_eq!(num("1,000,000"), 1_000_000);
        assert_eq!(num("999"), 999);
        assert_eq!(num("12,345"), 12_345);

        assert!(parse_numeric_expr("1,00").is_err());
        assert!(parse_numeric_expr("1234,567").is_err());
        assert!(parse_numeric_expr(",123").is_err());
    }

    #[test]
    fn power_and_scientific_terms() {
        assert_eq!(num("10^6"), 1_000_000);
        assert_eq!(num("1e6"), 1_000_000);
        assert_eq!(num("2^10"), 1024);
        assert_eq!(num("5E3"), 5000);
        assert_eq!(num("10^100"), Integer::u_pow_u(10, 100).complete());
    }

    #[test]
    fn sums_of_terms() {
        assert_eq!(num("10^6 + 10"), 1_000_010);
        assert_eq!(
            num("10e100 + 10e9"),
            Integer::from(10) * Integer::u_pow_u(10, 100).complete() + 10_000_000_000u64
        );
    }

    #[test]
    fn malformed_expressions_rejected() {
        for bad in ["", "abc", "10^2^3", "1e2e3", "10^1e2", "^5", "10^", "--3"] {
            assert!(parse_numeric_expr(bad).is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn u64_window() {
        assert_eq!(parse_numeric_expr_u64("1e6").unwrap(), 1_000_000);
        assert_eq!(parse_numeric_expr_u64("2^64 + 10^3").unwrap_err().to_string(), "expression \"2^64 + 10^3\" does not fit 64 bits");
        assert!(parse_numeric_expr_u64("2^64").is_err());
        assert!(parse_numeric_expr_u64("10^30").is_err());
    }

    #[test]
    fn range_spellings() {
        let expected = (Integer::from(10u32), Integer::from(100u32));
        for spelling in ["10,100", "[10,100]", "range[10,100]", "10..100", "10:100"] {
            assert_eq!(parse_inclusive_range(spelling).unwrap(), expected, "{:?}", spelling);
        }
    }

    #[test]
    fn range_with_expressions_and_grouping() {
        let (lo, hi) = parse_inclusive_range("10^6..10^6 + 1000").unwrap();
        assert_eq!(lo, 1_000_000);
        assert_eq!(hi, 1_001_000);

        // grouped commas inside a comma-separated range
        let (lo, hi) = parse_inclusive_range("1,000,2,000").unwrap();
        assert_eq!(lo, 1000);
        assert_eq!(hi, 2000);
    }

    #[test]
    fn range_ordering_enforced() {
        assert!(parse_inclusive_range("100..10").is_err());
        assert!(parse_inclusive_range("[5,4]").is_err());
        assert!(parse_inclusive_range("10").is_err());
    }
}
