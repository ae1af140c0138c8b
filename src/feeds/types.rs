use crate::models::expiry::unix_to_date;
use crate::models::OptionType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Chart (spot price) ──

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResponse {
    pub chart: Option<ChartEnvelope>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartEnvelope {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    pub meta: Option<ChartMeta>,
    pub indicators: Option<Indicators>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    #[allow(dead_code)]
    pub symbol: Option<String>,
    #[allow(dead_code)]
    pub currency: Option<String>,
    pub regular_market_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Indicators {
    pub quote: Option<Vec<QuoteSeries>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteSeries {
    /// Nulls appear for bars with no trades
    pub close: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: Option<String>,
    pub description: Option<String>,
}

impl std::fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.code.as_deref().unwrap_or("error"),
            self.description.as_deref().unwrap_or("")
        )
    }
}

impl ChartResult {
    /// Last non-null daily close, falling back to the quote's regular market price.
    pub fn last_price(&self) -> Option<f64> {
        let last_close = self
            .indicators
            .as_ref()
            .and_then(|i| i.quote.as_ref())
            .and_then(|q| q.first())
            .and_then(|s| s.close.as_ref())
            .and_then(|closes| closes.iter().rev().find_map(|c| *c));

        last_close.or_else(|| self.meta.as_ref().and_then(|m| m.regular_market_price))
    }
}

// ── Option chain ──

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsResponse {
    pub option_chain: Option<OptionsEnvelope>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptionsEnvelope {
    pub result: Option<Vec<OptionsResult>>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsResult {
    #[allow(dead_code)]
    pub underlying_symbol: Option<String>,
    pub expiration_dates: Option<Vec<i64>>,
    #[allow(dead_code)]
    pub strikes: Option<Vec<f64>>,
    pub options: Option<Vec<OptionsByExpiry>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsByExpiry {
    pub expiration_date: Option<i64>,
    pub calls: Option<Vec<ChainQuote>>,
    pub puts: Option<Vec<ChainQuote>>,
}

/// One row of the chain table. Field names follow the provider so the
/// presentation layer can show them as columns unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainQuote {
    pub contract_symbol: Option<String>,
    pub strike: Option<f64>,
    pub last_price: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub change: Option<f64>,
    pub percent_change: Option<f64>,
    pub volume: Option<i64>,
    pub open_interest: Option<i64>,
    pub implied_volatility: Option<f64>,
    pub in_the_money: Option<bool>,
    pub expiration: Option<i64>,
    pub last_trade_date: Option<i64>,
}

impl ChainQuote {
    #[inline]
    pub fn has_strike(&self, strike: f64) -> bool {
        self.strike.is_some_and(|k| (k - strike).abs() < 1e-9)
    }
}

impl OptionsResult {
    pub fn expiration_dates(&self) -> Vec<NaiveDate> {
        self.expiration_dates
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|ts| unix_to_date(*ts))
            .collect()
    }
}

/// Calls and puts for a single expiration, with rows lacking a strike dropped.
#[derive(Debug, Clone, Serialize)]
pub struct OptionChain {
    pub ticker: String,
    pub expiration: NaiveDate,
    pub calls: Vec<ChainQuote>,
    pub puts: Vec<ChainQuote>,
}

impl OptionChain {
    pub fn new(
        ticker: impl Into<String>,
        expiration: NaiveDate,
        calls: Vec<ChainQuote>,
        puts: Vec<ChainQuote>,
    ) -> Self {
        let keep = |q: &ChainQuote| q.strike.is_some_and(|k| k.is_finite() && k > 0.0);
        Self {
            ticker: ticker.into(),
            expiration,
            calls: calls.into_iter().filter(keep).collect(),
            puts: puts.into_iter().filter(keep).collect(),
        }
    }

    pub fn quotes(&self, option_type: OptionType) -> &[ChainQuote] {
        match option_type {
            OptionType::Call => &self.calls,
            OptionType::Put => &self.puts,
        }
    }

    /// Sorted, de-duplicated strikes for one side.
    pub fn strikes(&self, option_type: OptionType) -> Vec<f64> {
        let mut strikes: Vec<f64> =
            self.quotes(option_type).iter().filter_map(|q| q.strike).collect();
        strikes.sort_by(|a, b| a.total_cmp(b));
        strikes.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
        strikes
    }

    pub fn find(&self, option_type: OptionType, strike: f64) -> Option<&ChainQuote> {
        self.quotes(option_type).iter().find(|q| q.has_strike(strike))
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() || self.puts.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_chart_last_close() {
        let resp: ChartResponse = serde_json::from_str(CHART_JSON).unwrap();
        let result = &resp.chart.unwrap().result.unwrap()[0];
        // Trailing null is skipped
        assert_eq!(result.last_price(), Some(229.87));
    }

    #[test]
    fn test_chart_falls_back_to_market_price() {
        let json = r#"{"chart":{"result":[{"meta":{"regularMarketPrice":99.5},
            "indicators":{"quote":[{"close":[null]}]}}],"error":null}}"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.chart.unwrap().result.unwrap()[0].last_price(), Some(99.5));
    }

    #[test]
    fn test_chart_error_body() {
        let resp: ChartResponse = serde_json::from_str(CHART_NOT_FOUND_JSON).unwrap();
        let env = resp.chart.unwrap();
        assert!(env.result.is_none());
        assert!(env.error.unwrap().to_string().starts_with("Not Found"));
    }

    #[test]
    fn test_options_decode() {
        let resp: OptionsResponse = serde_json::from_str(OPTIONS_JSON).unwrap();
        let result = &resp.option_chain.unwrap().result.unwrap()[0];
        let dates = result.expiration_dates();
        assert_eq!(dates.len(), 2);
        assert!(dates[0] < dates[1]);

        let by_exp = &result.options.as_ref().unwrap()[0];
        let calls = by_exp.calls.as_ref().unwrap();
        assert_eq!(calls[0].open_interest, Some(4120));
        assert_eq!(calls[1].volume, None);
    }

    #[test]
    fn test_chain_strikes_and_lookup() {
        let q = |strike: Option<f64>| ChainQuote {
            contract_symbol: None,
            strike,
            last_price: None,
            bid: None,
            ask: None,
            change: None,
            percent_change: None,
            volume: None,
            open_interest: None,
            implied_volatility: None,
            in_the_money: None,
            expiration: None,
            last_trade_date: None,
        };
        let exp = NaiveDate::from_ymd_opt(2026, 12, 18).unwrap();
        let chain = OptionChain::new(
            "AAPL",
            exp,
            vec![q(Some(240.0)), q(Some(220.0)), q(Some(240.0)), q(None)],
            vec![q(Some(230.0))],
        );
        assert_eq!(chain.calls.len(), 3, "strike-less rows are dropped");
        assert_eq!(chain.strikes(OptionType::Call), vec![220.0, 240.0]);
        assert!(chain.find(OptionType::Put, 230.0).is_some());
        assert!(chain.find(OptionType::Put, 220.0).is_none());
        assert!(!chain.is_empty());
    }
}
