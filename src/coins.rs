//! Coin amounts and decimal gas prices
//!
//! Integer amounts use `u128`. Gas prices are exact decimals so that the fee
//! floor is deterministic across nodes.

use crate::error::AdmissionError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Decimal price per unit of gas.
pub type GasPrice = Decimal;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: &str, amount: u128) -> Self {
        Coin {
            denom: denom.to_string(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Splits `"125uatone"` into `("125", "uatone")`.
fn split_amount_denom(s: &str) -> Result<(&str, &str), AdmissionError> {
    let s = s.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(|| AdmissionError::InvalidRequest(format!("missing denom in coin '{}'", s)))?;
    let (amount, denom) = s.split_at(split);
    if amount.is_empty() {
        return Err(AdmissionError::InvalidRequest(format!(
            "missing amount in coin '{}'",
            s
        )));
    }
    validate_denom(denom)?;
    Ok((amount, denom))
}

/// Denoms are 3-128 characters, start with a letter, then letters, digits or `/:._-`.
pub fn validate_denom(denom: &str) -> Result<(), AdmissionError> {
    let valid_len = (3..=128).contains(&denom.len());
    let valid_start = denom.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let valid_chars = denom
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "/:._-".contains(c));
    if valid_len && valid_start && valid_chars {
        Ok(())
    } else {
        Err(AdmissionError::InvalidRequest(format!(
            "invalid denom: {}",
            denom
        )))
    }
}

impl FromStr for Coin {
    type Err = AdmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, denom) = split_amount_denom(s)?;
        let amount = amount
            .parse::<u128>()
            .map_err(|e| AdmissionError::InvalidRequest(format!("invalid coin amount: {}", e)))?;
        Ok(Coin::new(denom, amount))
    }
}

/// A set of coins keyed by denom. Zero amounts are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(BTreeMap<String, u128>);

impl Coins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a coin set, merging duplicate denoms and dropping zero amounts.
    pub fn from_coins<I: IntoIterator<Item = Coin>>(coins: I) -> Result<Self, AdmissionError> {
        let mut set = Coins::new();
        for coin in coins {
            set = set.checked_add(&Coins::single(coin))?;
        }
        Ok(set)
    }

    pub fn single(coin: Coin) -> Self {
        let mut map = BTreeMap::new();
        if coin.amount > 0 {
            map.insert(coin.denom, coin.amount);
        }
        Coins(map)
    }

    pub fn amount_of(&self, denom: &str) -> u128 {
        self.0.get(denom).copied().unwrap_or(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn denoms(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = Coin> + '_ {
        self.0.iter().map(|(denom, amount)| Coin::new(denom, *amount))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every denom of `other` is covered by at least the same amount here.
    pub fn is_all_gte(&self, other: &Coins) -> bool {
        other
            .0
            .iter()
            .all(|(denom, amount)| self.amount_of(denom) >= *amount)
    }

    /// True when at least one denom of `other` is covered. An empty `other` is always covered.
    pub fn is_any_gte(&self, other: &Coins) -> bool {
        other.is_zero()
            || other
                .0
                .iter()
                .any(|(denom, amount)| self.amount_of(denom) >= *amount)
    }

    pub fn checked_add(&self, other: &Coins) -> Result<Coins, AdmissionError> {
        let mut out = self.0.clone();
        for (denom, amount) in &other.0 {
            let entry = out.entry(denom.clone()).or_insert(0);
            *entry = entry.checked_add(*amount).ok_or_else(|| {
                AdmissionError::InvalidRequest(format!("coin amount overflow for {}", denom))
            })?;
        }
        Ok(Coins(out))
    }

    /// Subtracts `other`, failing if any denom would go negative.
    pub fn checked_sub(&self, other: &Coins) -> Result<Coins, AdmissionError> {
        let mut out = self.0.clone();
        for (denom, amount) in &other.0 {
            let have = self.amount_of(denom);
            let left = have.checked_sub(*amount).ok_or_else(|| {
                AdmissionError::InsufficientFunds(format!(
                    "{}{} is smaller than {}{}",
                    have, denom, amount, denom
                ))
            })?;
            if left == 0 {
                out.remove(denom);
            } else {
                out.insert(denom.clone(), left);
            }
        }
        Ok(Coins(out))
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for Coins {
    type Err = AdmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Coins::new());
        }
        Coins::from_coins(
            s.split(',')
                .map(str::parse::<Coin>)
                .collect::<Result<Vec<_>, _>>()?,
        )
    }
}

/// Decimal coin, used for gas prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecCoin {
    pub denom: String,
    pub amount: GasPrice,
}

impl DecCoin {
    pub fn new(denom: &str, amount: GasPrice) -> Self {
        DecCoin {
            denom: denom.to_string(),
            amount,
        }
    }

    /// `ceil(amount * gas)` in this denom, or `None` on overflow.
    pub fn fee_for_gas(&self, gas: u64) -> Option<Coin> {
        let fee = self.amount.checked_mul(Decimal::from(gas))?.ceil();
        Some(Coin::new(&self.denom, fee.to_u128()?))
    }
}

impl fmt::Display for DecCoin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for DecCoin {
    type Err = AdmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, denom) = split_amount_denom(s)?;
        let amount = amount
            .parse::<GasPrice>()
            .map_err(|e| AdmissionError::InvalidRequest(format!("invalid gas price: {}", e)))?;
        Ok(DecCoin::new(denom, amount))
    }
}

/// Parses `"0.01uatone,0.5stake"`. Empty input yields an empty list.
pub fn parse_dec_coins(s: &str) -> Result<Vec<DecCoin>, AdmissionError> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(',').map(str::parse::<DecCoin>).collect()
}

/// Fee required for `gas` at each listed price. Prices for the same denom are summed.
pub fn required_fees(prices: &[DecCoin], gas: u64) -> Result<Coins, AdmissionError> {
    let mut required = Coins::new();
    for price in prices {
        let fee = price.fee_for_gas(gas).ok_or_else(|| {
            AdmissionError::GasOverflow(format!("fee for {} gas at {} overflows", gas, price))
        })?;
        required = required.checked_add(&Coins::single(fee))?;
    }
    Ok(required)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(s: &str) -> Coins {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let c = coins("100uatone,5stake,0uzero");
        assert_eq!(c.amount_of("uatone"), 100);
        assert_eq!(c.amount_of("uzero"), 0);
        assert_eq!(c.to_string(), "5stake,100uatone");
        assert!("10".parse::<Coin>().is_err());
        assert!("10u".parse::<Coin>().is_err());
    }

    #[test]
    fn test_any_and_all_gte() {
        let fee = coins("100uatone,1stake");
        assert!(fee.is_any_gte(&coins("100uatone,50stake")));
        assert!(!fee.is_all_gte(&coins("100uatone,50stake")));
        assert!(!fee.is_any_gte(&coins("101uatone,50stake")));
        assert!(fee.is_any_gte(&Coins::new()));
    }

    #[test]
    fn test_checked_sub_insufficient() {
        let bal = coins("10uatone");
        assert_eq!(bal.checked_sub(&coins("4uatone")).unwrap(), coins("6uatone"));
        assert!(matches!(
            bal.checked_sub(&coins("11uatone")),
            Err(AdmissionError::InsufficientFunds(_))
        ));
        assert!(bal.checked_sub(&coins("10uatone")).unwrap().is_zero());
    }

    #[test]
    fn test_fee_for_gas_rounds_up() {
        let price: DecCoin = "0.0025uatone".parse().unwrap();
        // 0.0025 * 200_001 = 500.0025 -> 501
        assert_eq!(price.fee_for_gas(200_001).unwrap().amount, 501);
        assert_eq!(price.fee_for_gas(200_000).unwrap().amount, 500);
        assert_eq!(price.fee_for_gas(0).unwrap().amount, 0);
    }

    #[test]
    fn test_required_fees_multi_denom() {
        let prices = parse_dec_coins("0.01uatone,1stake").unwrap();
        let req = required_fees(&prices, 1_000).unwrap();
        assert_eq!(req.amount_of("uatone"), 10);
        assert_eq!(req.amount_of("stake"), 1_000);
        assert!(parse_dec_coins("").unwrap().is_empty());
    }
}
