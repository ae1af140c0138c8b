use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub market_data_base_url: String,
    /// Fetched once for the session cookie the options endpoint requires
    pub market_data_cookie_url: String,
    pub default_ticker: String,
    /// Percent, e.g. 1.5 = 1.5%
    pub risk_free_rate_pct: f64,
    /// Percent, annualized
    pub volatility_pct: f64,
    pub payoff_points: usize,
    pub http_timeout_secs: u64,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let risk_free_rate_pct = parse_var("RISK_FREE_RATE_PCT", "1.5")?;
        let volatility_pct = parse_var("VOLATILITY_PCT", "20.0")?;
        let payoff_points = parse_var("PAYOFF_POINTS", "100")?;
        let http_timeout_secs = parse_var("HTTP_TIMEOUT_SECS", "10")?;
        let server_port = parse_var("SERVER_PORT", "3001")?;

        let cfg = Self {
            market_data_base_url: env_var_or(
                "MARKET_DATA_BASE_URL",
                "https://query2.finance.yahoo.com",
            ),
            market_data_cookie_url: env_var_or("MARKET_DATA_COOKIE_URL", "https://fc.yahoo.com"),
            default_ticker: env_var_or("DEFAULT_TICKER", "AAPL").trim().to_uppercase(),
            risk_free_rate_pct,
            volatility_pct,
            payoff_points,
            http_timeout_secs,
            server_port,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> AppResult<()> {
        if self.volatility_pct <= 0.0 || !self.volatility_pct.is_finite() {
            return Err(AppError::Config(format!(
                "VOLATILITY_PCT must be positive, got {}",
                self.volatility_pct
            )));
        }
        if !self.risk_free_rate_pct.is_finite() {
            return Err(AppError::Config("RISK_FREE_RATE_PCT must be finite".into()));
        }
        if self.payoff_points < 2 {
            return Err(AppError::Config("PAYOFF_POINTS must be at least 2".into()));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            market_data_base_url: "https://query2.finance.yahoo.com".to_string(),
            market_data_cookie_url: "https://fc.yahoo.com".to_string(),
            default_ticker: "AAPL".to_string(),
            risk_free_rate_pct: 1.5,
            volatility_pct: 20.0,
            payoff_points: 100,
            http_timeout_secs: 10,
            server_port: 3001,
        }
    }
}

fn parse_var<T>(key: &str, default: &str) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_var_or(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| AppError::Config(format!("{key}: {e}")))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_volatility_rejected() {
        let cfg = AppConfig { volatility_pct: 0.0, ..AppConfig::default() };
        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_single_point_rejected() {
        let cfg = AppConfig { payoff_points: 1, ..AppConfig::default() };
        assert!(cfg.validate().is_err());
    }
}
