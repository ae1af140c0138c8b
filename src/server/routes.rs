use crate::analysis::{self, AnalysisReport, Selection};
use crate::errors::{AppError, AppResult};
use crate::feeds::market_data::normalize_ticker;
use crate::feeds::types::OptionChain;
use crate::models::expiry::parse_expiration;
use crate::models::payoff::{payoff, price_range, PayoffBasis, PayoffCurve};
use crate::models::{OptionContract, OptionType, PricingResult};
use crate::state::{AppState, PerfCounters};
use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::NaiveDate;
use std::sync::Arc;

#[derive(serde::Deserialize)]
pub struct ChainQuery {
    pub expiration: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct AnalyzeQuery {
    pub expiration: Option<String>,
    pub option_type: Option<String>,
    pub strike: Option<f64>,
    /// Percent
    pub rate: Option<f64>,
    /// Percent
    pub volatility: Option<f64>,
    pub points: Option<usize>,
}

#[derive(serde::Deserialize)]
pub struct PayoffRequest {
    pub contract: OptionContract,
    /// Underlying prices to evaluate; defaults to 50%..150% of spot
    pub prices: Option<Vec<f64>>,
    #[serde(default)]
    pub net_of_premium: bool,
    pub points: Option<usize>,
}

#[derive(serde::Serialize)]
pub struct PayoffResponse {
    pub option_type: OptionType,
    pub strike: f64,
    pub premium: Option<f64>,
    pub curve: PayoffCurve,
}

#[derive(serde::Serialize)]
pub struct ChainResponse {
    #[serde(flatten)]
    pub chain: OptionChain,
    pub call_strikes: Vec<f64>,
    pub put_strikes: Vec<f64>,
}

const MAX_POINTS: usize = 5000;

fn tracked<T>(state: &AppState, res: AppResult<T>) -> AppResult<T> {
    PerfCounters::bump(&state.counters.requests_served);
    if res.is_err() {
        PerfCounters::bump(&state.counters.errors);
    }
    res
}

/// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/defaults -- initial values for the input widgets
pub async fn get_defaults(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let cfg = &state.config;
    Json(serde_json::json!({
        "ticker": cfg.default_ticker,
        "option_type": OptionType::Call,
        "rate_pct": cfg.risk_free_rate_pct,
        "volatility_pct": cfg.volatility_pct,
        "points": cfg.payoff_points,
    }))
}

/// GET /api/quote/{ticker} -- current spot price
pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let res = quote(&state, &ticker).await;
    tracked(&state, res)
}

async fn quote(state: &AppState, ticker: &str) -> AppResult<Json<serde_json::Value>> {
    let ticker = normalize_ticker(ticker)?;
    PerfCounters::bump(&state.counters.market_data_calls);
    let spot = state.market.spot_price(&ticker).await?;
    Ok(Json(serde_json::json!({ "ticker": ticker, "spot": spot })))
}

/// GET /api/expirations/{ticker}
pub async fn get_expirations(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let res = expirations(&state, &ticker).await;
    tracked(&state, res)
}

async fn expirations(state: &AppState, ticker: &str) -> AppResult<Json<serde_json::Value>> {
    let ticker = normalize_ticker(ticker)?;
    PerfCounters::bump(&state.counters.market_data_calls);
    let expirations = state.market.expirations(&ticker).await?;
    Ok(Json(serde_json::json!({ "ticker": ticker, "expirations": expirations })))
}

/// GET /api/chain/{ticker}?expiration=YYYY-MM-DD -- calls and puts tables
pub async fn get_chain(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
    Query(params): Query<ChainQuery>,
) -> AppResult<Json<ChainResponse>> {
    let res = chain(&state, &ticker, &params).await;
    tracked(&state, res)
}

async fn chain(
    state: &AppState,
    ticker: &str,
    params: &ChainQuery,
) -> AppResult<Json<ChainResponse>> {
    let ticker = normalize_ticker(ticker)?;
    let expiration = resolve_expiration(state, &ticker, params.expiration.as_deref()).await?;
    PerfCounters::bump(&state.counters.market_data_calls);
    let chain = state.market.option_chain(&ticker, expiration).await?;
    Ok(Json(ChainResponse {
        call_strikes: chain.strikes(OptionType::Call),
        put_strikes: chain.strikes(OptionType::Put),
        chain,
    }))
}

/// POST /api/price -- Black-Scholes price for a contract (no market data)
pub async fn post_price(
    State(state): State<Arc<AppState>>,
    Json(contract): Json<OptionContract>,
) -> AppResult<Json<PricingResult>> {
    let res = state.pricer.price(&contract).map(Json);
    if res.is_ok() {
        PerfCounters::bump(&state.counters.options_priced);
    }
    tracked(&state, res)
}

/// POST /api/payoff -- payoff curve at expiration, optionally net of the theoretical premium
pub async fn post_payoff(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PayoffRequest>,
) -> AppResult<Json<PayoffResponse>> {
    let res = payoff_curve(&state, req);
    tracked(&state, res)
}

fn payoff_curve(state: &AppState, req: PayoffRequest) -> AppResult<Json<PayoffResponse>> {
    let prices = match req.prices {
        Some(prices) => prices,
        None => {
            let points = check_points(req.points.unwrap_or(state.config.payoff_points))?;
            price_range(req.contract.spot, analysis::RANGE_LOW, analysis::RANGE_HIGH, points)?
        }
    };

    let (basis, premium) = if req.net_of_premium {
        let pricing = state.pricer.price(&req.contract)?;
        PerfCounters::bump(&state.counters.options_priced);
        (PayoffBasis::NetOfPremium(pricing.price), Some(pricing.price))
    } else {
        (PayoffBasis::AtExpiration, None)
    };

    PerfCounters::bump(&state.counters.payoff_curves);
    Ok(Json(PayoffResponse {
        option_type: req.contract.option_type,
        strike: req.contract.strike,
        premium,
        curve: payoff(&req.contract, &prices, basis),
    }))
}

/// GET /api/analyze/{ticker} -- spot + chain + selected contract + price + payoff curve
pub async fn get_analysis(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
    Query(params): Query<AnalyzeQuery>,
) -> AppResult<Json<AnalysisReport>> {
    let res = analyze(&state, &ticker, &params).await;
    tracked(&state, res)
}

async fn analyze(
    state: &AppState,
    ticker: &str,
    params: &AnalyzeQuery,
) -> AppResult<Json<AnalysisReport>> {
    let ticker = normalize_ticker(ticker)?;
    let option_type = match params.option_type.as_deref() {
        Some(s) => s.parse::<OptionType>()?,
        None => OptionType::Call,
    };
    let points = check_points(params.points.unwrap_or(state.config.payoff_points))?;

    let expiration = resolve_expiration(state, &ticker, params.expiration.as_deref()).await?;

    state.counters.market_data_calls.fetch_add(2, portable_atomic::Ordering::Relaxed);
    let (spot, chain) = tokio::try_join!(
        state.market.spot_price(&ticker),
        state.market.option_chain(&ticker, expiration),
    )?;

    let strike = match params.strike {
        Some(k) => k,
        None => nearest_strike(&chain, option_type, spot).ok_or_else(|| {
            AppError::Unavailable(format!("no {option_type} strikes for {ticker}"))
        })?,
    };

    let selection = Selection {
        option_type,
        strike,
        rate_pct: params.rate.unwrap_or(state.config.risk_free_rate_pct),
        volatility_pct: params.volatility.unwrap_or(state.config.volatility_pct),
        points,
    };

    let today = chrono::Utc::now().date_naive();
    let report = analysis::build_report(&state.pricer, &selection, spot, &chain, today)?;
    PerfCounters::bump(&state.counters.options_priced);
    PerfCounters::bump(&state.counters.payoff_curves);
    Ok(Json(report))
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(state.counters.snapshot())
}

/// Explicit date if given, otherwise the soonest listed expiration.
async fn resolve_expiration(
    state: &AppState,
    ticker: &str,
    requested: Option<&str>,
) -> AppResult<NaiveDate> {
    if let Some(s) = requested {
        return parse_expiration(s);
    }
    PerfCounters::bump(&state.counters.market_data_calls);
    let expirations = state.market.expirations(ticker).await?;
    expirations.first().copied().ok_or_else(|| {
        AppError::Unavailable(format!("no option expirations available for {ticker}"))
    })
}

/// Listed strike closest to spot; ties go to the lower strike.
fn nearest_strike(chain: &OptionChain, option_type: OptionType, spot: f64) -> Option<f64> {
    chain
        .strikes(option_type)
        .into_iter()
        .min_by(|a, b| (a - spot).abs().total_cmp(&(b - spot).abs()))
}

fn check_points(points: usize) -> AppResult<usize> {
    if points > MAX_POINTS {
        return Err(AppError::invalid(format!("points must be at most {MAX_POINTS}, got {points}")));
    }
    Ok(points)
}
