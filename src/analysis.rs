use crate::errors::{AppError, AppResult};
use crate::feeds::types::{ChainQuote, OptionChain};
use crate::models::black_scholes::BlackScholes;
use crate::models::expiry::years_to_expiration;
use crate::models::payoff::{payoff, price_range, PayoffBasis, PayoffCurve};
use crate::models::{OptionContract, OptionType, PricingResult};
use chrono::NaiveDate;
use serde::Serialize;

/// Payoff chart spans 50%..150% of spot.
pub const RANGE_LOW: f64 = 0.5;
pub const RANGE_HIGH: f64 = 1.5;

/// What the user picked: side, strike and the Black-Scholes inputs in percent.
#[derive(Debug, Clone, Copy)]
pub struct Selection {
    pub option_type: OptionType,
    pub strike: f64,
    pub rate_pct: f64,
    pub volatility_pct: f64,
    pub points: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub ticker: String,
    pub spot: f64,
    pub expiration: NaiveDate,
    pub time_years: f64,
    pub option_type: OptionType,
    pub strike: f64,
    pub quote: ChainQuote,
    pub rate: f64,
    pub volatility: f64,
    pub pricing: PricingResult,
    /// Profit/loss at expiration after paying the theoretical price
    pub payoff: PayoffCurve,
    /// Vertical marker for the chart
    pub spot_marker: f64,
}

/// Assemble the report from already-fetched market data. Pure: the caller
/// sequences the fetches, this only selects, prices and builds the curve.
pub fn build_report(
    pricer: &BlackScholes,
    selection: &Selection,
    spot: f64,
    chain: &OptionChain,
    today: NaiveDate,
) -> AppResult<AnalysisReport> {
    let quote = chain.find(selection.option_type, selection.strike).ok_or_else(|| {
        AppError::invalid(format!(
            "strike {} not listed for {} {} {}",
            selection.strike, chain.ticker, chain.expiration, selection.option_type
        ))
    })?;

    let time_years = years_to_expiration(chain.expiration, today)?;
    let rate = selection.rate_pct / 100.0;
    let volatility = selection.volatility_pct / 100.0;

    let contract = OptionContract::new(
        spot,
        selection.strike,
        time_years,
        rate,
        volatility,
        selection.option_type,
    );
    let pricing = pricer.price(&contract)?;

    let grid = price_range(spot, RANGE_LOW, RANGE_HIGH, selection.points)?;
    let curve = payoff(&contract, &grid, PayoffBasis::NetOfPremium(pricing.price));

    tracing::info!(
        ticker = %chain.ticker,
        expiration = %chain.expiration,
        option_type = %selection.option_type,
        strike = selection.strike,
        spot,
        price = pricing.price,
        "option priced"
    );

    Ok(AnalysisReport {
        ticker: chain.ticker.clone(),
        spot,
        expiration: chain.expiration,
        time_years,
        option_type: selection.option_type,
        strike: selection.strike,
        quote: quote.clone(),
        rate,
        volatility,
        pricing,
        payoff: curve,
        spot_marker: spot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(strike: f64) -> ChainQuote {
        ChainQuote {
            contract_symbol: Some(format!("TEST{strike}")),
            strike: Some(strike),
            last_price: Some(4.2),
            bid: Some(4.0),
            ask: Some(4.4),
            change: None,
            percent_change: None,
            volume: Some(120),
            open_interest: Some(800),
            implied_volatility: Some(0.22),
            in_the_money: Some(false),
            expiration: None,
            last_trade_date: None,
        }
    }

    fn chain() -> OptionChain {
        OptionChain::new(
            "TEST",
            NaiveDate::from_ymd_opt(2027, 10, 16).unwrap(),
            vec![quote(90.0), quote(100.0), quote(110.0)],
            vec![quote(95.0), quote(100.0)],
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn selection(option_type: OptionType, strike: f64) -> Selection {
        Selection { option_type, strike, rate_pct: 5.0, volatility_pct: 20.0, points: 100 }
    }

    /// Spot 100 against the fixture chain.
    fn report(sel: &Selection, today: NaiveDate) -> AppResult<AnalysisReport> {
        build_report(&BlackScholes::new(), sel, 100.0, &chain(), today)
    }

    #[test]
    fn test_report_prices_selected_call() {
        let report = report(&selection(OptionType::Call, 100.0), today()).unwrap();
        assert!((report.time_years - 1.0).abs() < 1e-12);
        assert!((report.rate - 0.05).abs() < 1e-12);
        assert!((report.volatility - 0.2).abs() < 1e-12);
        assert!((report.pricing.price - 10.45).abs() < 0.01, "price={}", report.pricing.price);
        assert_eq!(report.quote.bid, Some(4.0));
    }

    #[test]
    fn test_payoff_is_net_of_premium() {
        let report = report(&selection(OptionType::Put, 100.0), today()).unwrap();
        assert_eq!(report.payoff.len(), 100);
        assert_eq!(report.payoff[0].underlying, 50.0);
        assert_eq!(report.payoff[99].underlying, 150.0);
        // Above the strike the put expires worthless: loss equals premium
        let last = report.payoff[99];
        assert!((last.payoff + report.pricing.price).abs() < 1e-12);
        let first = report.payoff[0];
        assert!((first.payoff - (50.0 - report.pricing.price)).abs() < 1e-9);
    }

    #[test]
    fn test_unlisted_strike_rejected() {
        let err = report(&selection(OptionType::Put, 110.0), today()).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_expired_chain_rejected() {
        let later = NaiveDate::from_ymd_opt(2027, 11, 1).unwrap();
        let res = report(&selection(OptionType::Call, 100.0), later);
        assert!(matches!(res, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_volatility_rejected() {
        let sel = Selection { volatility_pct: 0.0, ..selection(OptionType::Call, 90.0) };
        assert!(report(&sel, today()).is_err());
    }
}
