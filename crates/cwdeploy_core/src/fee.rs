//! Gas prices and fee computation.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::Coin;

/// Fixed gas limit used for code uploads.
pub const STORE_CODE_GAS_LIMIT: u64 = 3_000_000;

const DECIMAL_PLACES: u32 = 18;
const DECIMAL_ONE: u128 = 10u128.pow(DECIMAL_PLACES);

static GAS_PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9.]+)([a-zA-Z][a-zA-Z0-9/:._-]{2,127})$").expect("valid gas price regex")
});

/// Errors raised while parsing gas prices or computing fees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeeError {
    #[error("gas limit must be positive")]
    ZeroGasLimit,

    #[error("invalid gas price {0:?}")]
    InvalidGasPrice(String),

    #[error("invalid decimal {0:?}")]
    InvalidDecimal(String),

    #[error("fee amount overflows for gas limit {0}")]
    Overflow(u64),
}

/// Unsigned fixed-point decimal with 18 fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal {
    atomics: u128,
}

impl Decimal {
    pub const fn from_atomics(atomics: u128) -> Self {
        Self { atomics }
    }

    pub fn atomics(&self) -> u128 {
        self.atomics
    }

    pub fn is_zero(&self) -> bool {
        self.atomics == 0
    }
}

impl FromStr for Decimal {
    type Err = FeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FeeError::InvalidDecimal(s.to_string());

        let (whole, fraction) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
            || fraction.len() > DECIMAL_PLACES as usize
        {
            return Err(invalid());
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let fraction_atomics: u128 = if fraction.is_empty() {
            0
        } else {
            let scale = 10u128.pow(DECIMAL_PLACES - fraction.len() as u32);
            fraction.parse::<u128>().map_err(|_| invalid())? * scale
        };

        let atomics = whole
            .checked_mul(DECIMAL_ONE)
            .and_then(|w| w.checked_add(fraction_atomics))
            .ok_or_else(invalid)?;
        Ok(Self { atomics })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.atomics / DECIMAL_ONE;
        let fraction = self.atomics % DECIMAL_ONE;
        if fraction == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{fraction:018}");
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

/// Price of one unit of gas, e.g. `0.025ustake`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPrice {
    pub amount: Decimal,
    pub denom: String,
}

impl GasPrice {
    pub fn new(amount: Decimal, denom: impl Into<String>) -> Self {
        Self {
            amount,
            denom: denom.into(),
        }
    }
}

impl FromStr for GasPrice {
    type Err = FeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = GAS_PRICE_RE
            .captures(s.trim())
            .ok_or_else(|| FeeError::InvalidGasPrice(s.to_string()))?;
        let amount: Decimal = caps[1]
            .parse()
            .map_err(|_| FeeError::InvalidGasPrice(s.to_string()))?;
        Ok(Self::new(amount, &caps[2]))
    }
}

impl fmt::Display for GasPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// A fully specified transaction fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub gas_limit: u64,
    pub amount: Vec<Coin>,
}

/// Derive the fee for `gas_limit` units of gas at `gas_price`.
///
/// The amount is `ceil(price * limit)` in the price's denomination.
pub fn compute_fee(gas_limit: u64, gas_price: &GasPrice) -> Result<Fee, FeeError> {
    if gas_limit == 0 {
        return Err(FeeError::ZeroGasLimit);
    }
    let product = gas_price
        .amount
        .atomics()
        .checked_mul(u128::from(gas_limit))
        .ok_or(FeeError::Overflow(gas_limit))?;
    let amount = product.div_ceil(DECIMAL_ONE);

    Ok(Fee {
        gas_limit,
        amount: vec![Coin::new(amount, gas_price.denom.clone())],
    })
}
