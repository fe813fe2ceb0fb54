// ============================================================================
// STELLAR-SAVINGS - Amounts
// ============================================================================
// Native amounts are carried as stroops (1 XLM = 10,000,000 stroops) so that
// nothing between user input and the envelope goes through floating point.
//
// Precision policy:
//   transfers       exact to 7 decimal places, shown with 2
//   contract calls  whole integer units (i128)
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

pub const STROOPS_PER_XLM: i64 = 10_000_000;
const NATIVE_DECIMALS: usize = 7;

/// Native XLM amount in stroops
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_stroops(stroops: i64) -> Self {
        Amount(stroops)
    }

    pub fn from_xlm(whole: i64) -> Self {
        Amount(whole.saturating_mul(STROOPS_PER_XLM))
    }

    pub fn stroops(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Parse a plain decimal string ("12", "0.5", "10.0000000").
    ///
    /// Returns `None` for signs, exponents, more than seven fractional
    /// digits or values that overflow an i64 of stroops.
    pub fn parse(input: &str) -> Option<Self> {
        let (int_part, frac_part) = split_decimal(input.trim())?;
        if frac_part.len() > NATIVE_DECIMALS {
            return None;
        }

        let whole: i64 = if int_part.is_empty() { 0 } else { int_part.parse().ok()? };
        let mut frac: i64 = if frac_part.is_empty() { 0 } else { frac_part.parse().ok()? };
        for _ in frac_part.len()..NATIVE_DECIMALS {
            frac *= 10;
        }

        whole
            .checked_mul(STROOPS_PER_XLM)
            .and_then(|s| s.checked_add(frac))
            .map(Amount)
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Seven-decimal representation used by Horizon ("10.0000000")
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = STROOPS_PER_XLM as u64;
        format!("{}{}.{:07}", sign, abs / per, abs % per)
    }

    /// Two-decimal display value, rounded half up
    pub fn display_2dp(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let hundredths = (self.0.unsigned_abs() + 50_000) / 100_000;
        format!("{}{}.{:02}", sign, hundredths / 100, hundredths % 100)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} XLM", self.display_2dp())
    }
}

/// Parse whole contract units.
///
/// A fractional part is tolerated only when it is all zeros ("25.00").
pub fn parse_contract_units(input: &str) -> Option<i128> {
    let (int_part, frac_part) = split_decimal(input.trim())?;
    if !frac_part.bytes().all(|b| b == b'0') || int_part.is_empty() {
        return None;
    }
    int_part.parse().ok()
}

fn split_decimal(input: &str) -> Option<(&str, &str)> {
    let (int_part, frac_part) = match input.split_once('.') {
        Some((i, f)) => (i, f),
        None => (input, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !digits(int_part) || !digits(frac_part) {
        return None;
    }
    Some((int_part, frac_part))
}
