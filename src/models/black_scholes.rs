use crate::errors::{AppError, AppResult};
use crate::models::{OptionContract, OptionType, PricingResult};
use statrs::distribution::{ContinuousCDF, Normal};

/// Black-Scholes European option pricing.
///
/// d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
/// d2 = d1 - sigma * sqrt(T)
///
/// Call = S*Phi(d1) - K*e^(-rT)*Phi(d2)
/// Put  = K*e^(-rT)*Phi(-d2) - S*Phi(-d1)
///
/// Stateless apart from the cached standard normal; Send + Sync, so one
/// instance can be shared across tasks.
pub struct BlackScholes {
    normal: Normal,
}

impl BlackScholes {
    pub fn new() -> Self {
        Self { normal: Normal::standard() }
    }

    pub fn price(&self, contract: &OptionContract) -> AppResult<PricingResult> {
        validate(contract)?;

        let OptionContract { spot, strike, time, rate, volatility, option_type } = *contract;

        let sigma_sqrt_t = volatility * time.sqrt();
        let drift = (rate + 0.5 * volatility * volatility) * time;
        let d1 = ((spot / strike).ln() + drift) / sigma_sqrt_t;
        let d2 = d1 - sigma_sqrt_t;
        let discounted_strike = strike * (-rate * time).exp();

        let n = &self.normal;
        let price = match option_type {
            OptionType::Call => spot * n.cdf(d1) - discounted_strike * n.cdf(d2),
            OptionType::Put => discounted_strike * n.cdf(-d2) - spot * n.cdf(-d1),
        };

        // Finite inputs can still overflow sigma^2 or e^(-rT)
        if !(d1.is_finite() && d2.is_finite() && price.is_finite()) {
            return Err(AppError::invalid(format!(
                "price is undefined for {contract:?} (d1={d1}, d2={d2}, price={price})"
            )));
        }

        // Deep OTM prices can come out as -1e-17 from cancellation
        Ok(PricingResult { price: price.max(0.0), d1, d2 })
    }
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(c: &OptionContract) -> AppResult<()> {
    let fields = [
        ("spot", c.spot),
        ("strike", c.strike),
        ("time", c.time),
        ("rate", c.rate),
        ("volatility", c.volatility),
    ];
    if let Some((name, v)) = fields.iter().find(|(_, v)| !v.is_finite()) {
        return Err(AppError::invalid(format!("{name} must be finite, got {v}")));
    }
    if c.spot <= 0.0 {
        return Err(AppError::invalid(format!("spot must be positive, got {}", c.spot)));
    }
    if c.strike <= 0.0 {
        return Err(AppError::invalid(format!("strike must be positive, got {}", c.strike)));
    }
    if c.time <= 0.0 {
        let msg = format!("time to expiration must be positive, got {}", c.time);
        return Err(AppError::invalid(msg));
    }
    if c.volatility <= 0.0 {
        let msg = format!("volatility must be positive, got {}", c.volatility);
        return Err(AppError::invalid(msg));
    }
    Ok(())
}
