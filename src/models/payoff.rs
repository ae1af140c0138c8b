use crate::errors::{AppError, AppResult};
use crate::models::{OptionContract, OptionType};
use serde::Serialize;

/// Whether payoff values are raw intrinsic value at expiration or
/// profit/loss after the premium paid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PayoffBasis {
    AtExpiration,
    NetOfPremium(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PayoffPoint {
    pub underlying: f64,
    pub payoff: f64,
}

pub type PayoffCurve = Vec<PayoffPoint>;

/// Payoff at expiration for a single underlying price.
#[inline]
pub fn intrinsic(option_type: OptionType, strike: f64, underlying: f64) -> f64 {
    match option_type {
        OptionType::Call => (underlying - strike).max(0.0),
        OptionType::Put => (strike - underlying).max(0.0),
    }
}

/// Lazy payoff curve. Only strike and type are read from the contract;
/// points are independent so the caller's order is preserved as-is.
pub fn payoff_iter<'a, I>(
    contract: &OptionContract,
    prices: I,
    basis: PayoffBasis,
) -> impl Iterator<Item = PayoffPoint> + 'a
where
    I: IntoIterator<Item = f64>,
    I::IntoIter: 'a,
{
    let (option_type, strike) = (contract.option_type, contract.strike);
    let premium = match basis {
        PayoffBasis::AtExpiration => 0.0,
        PayoffBasis::NetOfPremium(p) => p,
    };
    prices.into_iter().map(move |u| PayoffPoint {
        underlying: u,
        payoff: intrinsic(option_type, strike, u) - premium,
    })
}

pub fn payoff(contract: &OptionContract, prices: &[f64], basis: PayoffBasis) -> PayoffCurve {
    payoff_iter(contract, prices.iter().copied(), basis).collect()
}

/// Evenly spaced grid from `center * low_multiple` to `center * high_multiple`, both ends included.
pub fn price_range(
    center: f64,
    low_multiple: f64,
    high_multiple: f64,
    points: usize,
) -> AppResult<Vec<f64>> {
    if !(center.is_finite() && center > 0.0) {
        return Err(AppError::invalid(format!("range center must be positive, got {center}")));
    }
    if !(low_multiple.is_finite() && high_multiple.is_finite()) || low_multiple > high_multiple {
        return Err(AppError::invalid(format!(
            "invalid range multiples [{low_multiple}, {high_multiple}]"
        )));
    }

    let lo = center * low_multiple;
    let hi = center * high_multiple;

    Ok(match points {
        0 => Vec::new(),
        1 => vec![lo],
        n => {
            let step = (hi - lo) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { hi } else { lo + step * i as f64 })
                .collect()
        }
    })
}
