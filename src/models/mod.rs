pub mod black_scholes;
pub mod expiry;
pub mod payoff;

use crate::errors::AppError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum OptionType {
    Call,
    Put,
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

impl std::str::FromStr for OptionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" | "c" => Ok(Self::Call),
            "put" | "p" => Ok(Self::Put),
            other => Err(AppError::invalid(format!("unrecognized option type: {other:?}"))),
        }
    }
}

impl TryFrom<String> for OptionType {
    type Error = AppError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One priced scenario. Copy, never mutated after construction.
///
/// Validation happens at pricing time, so an out-of-domain contract can
/// still be built and passed to `payoff`, which only reads strike and type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub spot: f64,
    pub strike: f64,
    /// Years to expiration
    pub time: f64,
    /// Continuously compounded, as a fraction (0.05 = 5%)
    pub rate: f64,
    /// Annualized, as a fraction (0.2 = 20%)
    pub volatility: f64,
    pub option_type: OptionType,
}

impl OptionContract {
    pub fn new(
        spot: f64,
        strike: f64,
        time: f64,
        rate: f64,
        volatility: f64,
        option_type: OptionType,
    ) -> Self {
        Self { spot, strike, time, rate, volatility, option_type }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricingResult {
    pub price: f64,
    pub d1: f64,
    pub d2: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_type_parsing() {
        assert_eq!("call".parse::<OptionType>().unwrap(), OptionType::Call);
        assert_eq!(" PUT ".parse::<OptionType>().unwrap(), OptionType::Put);
        assert_eq!("C".parse::<OptionType>().unwrap(), OptionType::Call);
        assert!(matches!("straddle".parse::<OptionType>(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_option_type_serde() {
        let t: OptionType = serde_json::from_str("\"Put\"").unwrap();
        assert_eq!(t, OptionType::Put);
        assert_eq!(serde_json::to_string(&OptionType::Call).unwrap(), "\"call\"");
        assert!(serde_json::from_str::<OptionType>("\"swap\"").is_err());
    }

    #[test]
    fn test_contract_deserializes() {
        let json = r#"{"spot":100,"strike":95,"time":0.5,"rate":0.01,
            "volatility":0.3,"option_type":"call"}"#;
        let c: OptionContract = serde_json::from_str(json).unwrap();
        assert_eq!(c.strike, 95.0);
        assert_eq!(c.option_type, OptionType::Call);
    }
}
