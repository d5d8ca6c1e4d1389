// crates/sluice-ledger/src/units.rs
//
// Token unit constants and human-readable amount formatting.
//
// Amounts are tracked in base units of an 18-decimal token. 1 token = 10^18
// base units. All accounting is integer arithmetic; decimals only appear at
// the edges (config files, CLI output).

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use sluice_core::error::SluiceError;
use sluice_core::types::{Amount, Timestamp};

/// Number of decimals of a whole token.
pub const DECIMALS: u32 = 18;

/// Base units in one whole token (10^18).
pub const UNIT: Amount = 1_000_000_000_000_000_000;

/// Fixed-point scale of the reward-per-share accumulator.
pub const REWARD_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Default floor for an accrual: one millionth of a token.
pub const DEFAULT_MIN_REWARD_AMOUNT: Amount = UNIT / 1_000_000;

pub const SECONDS_PER_DAY: Timestamp = 86_400;

/// Default vesting window for a fresh reward stream: 7 days.
pub const DEFAULT_STREAM_WINDOW_SECS: Timestamp = 7 * SECONDS_PER_DAY;

/// Display wrapper rendering base units as a decimal token amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tokens(pub Amount);

impl fmt::Display for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNIT;
        let frac = self.0 % UNIT;
        if frac == 0 {
            write!(f, "{}", whole)
        } else {
            // Up to 18 decimal places, trailing zeros trimmed
            let frac_str = format!("{:018}", frac);
            write!(f, "{}.{}", whole, frac_str.trim_end_matches('0'))
        }
    }
}

/// Parse a decimal token amount such as `"1.5"` into base units.
pub fn parse_units(s: &str) -> Result<Amount, SluiceError> {
    let s = s.trim();
    let bad = || SluiceError::InvalidInput(format!("bad token amount {:?}", s));

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(bad());
    }
    if frac.len() > DECIMALS as usize {
        return Err(SluiceError::InvalidInput(format!(
            "{:?} has more than {} decimals",
            s, DECIMALS
        )));
    }

    let whole: Amount = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| bad())?
    };
    let frac_units: Amount = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = DECIMALS as usize);
        padded.parse().map_err(|_| bad())?
    };

    whole
        .checked_mul(UNIT)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(|| SluiceError::overflow("token amount"))
}

/// Deserialize an amount written either as an integer in base units or as a
/// decimal token string (`"2.5"`). TOML integers stop at i64, so large
/// amounts in config and scenario files use the string form.
pub fn deserialize_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = Amount;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or a decimal token string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
            Ok(v as Amount)
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
            Amount::try_from(v).map_err(|_| E::custom(format!("negative amount {}", v)))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
            parse_units(v).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(AmountVisitor)
}

/// `(a * b) / c` and `(a * b) % c`, computed through a 256-bit product so
/// that reward math on 18-decimal amounts cannot overflow midway.
pub fn mul_div_rem(a: u128, b: u128, c: u128) -> Result<(u128, u128), SluiceError> {
    if c == 0 {
        return Err(SluiceError::InvalidInput("division by zero".to_string()));
    }
    if let Some(product) = a.checked_mul(b) {
        return Ok((product / c, product % c));
    }
    let (hi, lo) = mul_wide(a, b);
    if hi >= c {
        return Err(SluiceError::overflow("fixed-point quotient"));
    }
    // Long division of hi:lo by c, one bit at a time
    let mut rem = hi;
    let mut quotient = 0u128;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        quotient <<= 1;
        if carry == 1 || rem >= c {
            rem = rem.wrapping_sub(c);
            quotient |= 1;
        }
    }
    Ok((quotient, rem))
}

/// Full 256-bit product of two u128 values as (high, low) halves.
fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);
    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;
    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let lo = (ll & MASK) | (mid << 64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}
