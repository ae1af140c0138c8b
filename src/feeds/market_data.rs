use super::types::*;
use crate::errors::{AppError, AppResult};
use crate::models::expiry::{date_to_unix, unix_to_date};
use chrono::NaiveDate;
use reqwest::Client;
use smallvec::SmallVec;
use std::sync::Arc;
use tokio::sync::RwLock;

const USER_AGENT: &str = concat!("option-desk/", env!("CARGO_PKG_VERSION"));

/// Market data REST client (Yahoo Finance compatible JSON API).
/// All methods return Result, never panic. Callers validate presence of
/// data through the error variants before anything reaches the pricer.
///
/// The options endpoint only answers requests that carry a session cookie
/// and the matching crumb token. The cookie lives in the client's cookie
/// store; the crumb is fetched lazily and shared by every clone.
#[derive(Clone)]
pub struct MarketDataClient {
    client: Client,
    base_url: String,
    cookie_url: String,
    crumb: Arc<RwLock<Option<String>>>,
}

impl MarketDataClient {
    pub fn new(base_url: &str, cookie_url: &str, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_secs))
                .user_agent(USER_AGENT)
                .cookie_store(true)
                .pool_max_idle_per_host(4)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie_url: cookie_url.to_string(),
            crumb: Arc::new(RwLock::new(None)),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(path, status = status.as_u16(), "market data request failed");
            return Err(AppError::MarketData {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<T>().await.map_err(|e| AppError::Parse(format!("GET {path}: {e}")))
    }

    /// Cached crumb, or a fresh cookie + crumb handshake on first use.
    async fn crumb(&self) -> AppResult<String> {
        if let Some(crumb) = self.crumb.read().await.as_ref() {
            return Ok(crumb.clone());
        }

        let mut slot = self.crumb.write().await;
        if let Some(crumb) = slot.as_ref() {
            return Ok(crumb.clone());
        }

        // Only the Set-Cookie matters here; the cookie host answers 404
        if let Err(e) = self.client.get(&self.cookie_url).send().await {
            tracing::warn!(error = %e, "session cookie request failed");
        }

        let resp = self
            .client
            .get(format!("{}/v1/test/getcrumb", self.base_url))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "crumb request failed");
            return Err(AppError::MarketData { status: status.as_u16(), body });
        }

        let crumb = parse_crumb(&body)?;
        tracing::debug!("market data crumb acquired");
        *slot = Some(crumb.clone());
        Ok(crumb)
    }

    /// GET on the options endpoint with the crumb attached. A 401 means the
    /// crumb went stale: fetch a new one and retry once.
    async fn get_options(
        &self,
        ticker: &str,
        params: &[(&str, &str)],
    ) -> AppResult<OptionsResponse> {
        let mut refreshed = false;
        loop {
            let crumb = self.crumb().await?;
            let mut all: SmallVec<[(&str, &str); 4]> = params.iter().copied().collect();
            all.push(("crumb", crumb.as_str()));

            match self.get(&format!("/v7/finance/options/{ticker}{}", query(&all))).await {
                Err(e) if is_stale_crumb(&e) && !refreshed => {
                    tracing::info!(ticker, "crumb rejected, refreshing");
                    let mut slot = self.crumb.write().await;
                    // Another task may already have replaced it
                    if slot.as_deref() == Some(crumb.as_str()) {
                        *slot = None;
                    }
                    refreshed = true;
                }
                other => return other,
            }
        }
    }

    /// Latest daily close for `ticker`.
    pub async fn spot_price(&self, ticker: &str) -> AppResult<f64> {
        let ticker = normalize_ticker(ticker)?;
        let params = query(&[("range", "1d"), ("interval", "1d")]);
        let resp: ChartResponse = self.get(&format!("/v8/finance/chart/{ticker}{params}")).await?;

        let price = spot_from_chart(&ticker, resp)?;
        tracing::debug!(ticker = %ticker, price, "spot price fetched");
        Ok(price)
    }

    /// Listed expiration dates, soonest first.
    pub async fn expirations(&self, ticker: &str) -> AppResult<Vec<NaiveDate>> {
        let ticker = normalize_ticker(ticker)?;
        let resp = self.get_options(&ticker, &[]).await?;
        let result = options_result(&ticker, resp)?;

        let mut dates = result.expiration_dates();
        dates.sort();
        dates.dedup();
        if dates.is_empty() {
            let msg = format!("no option expirations available for {ticker}");
            return Err(AppError::Unavailable(msg));
        }
        Ok(dates)
    }

    /// Calls and puts for one expiration.
    pub async fn option_chain(
        &self,
        ticker: &str,
        expiration: NaiveDate,
    ) -> AppResult<OptionChain> {
        let ticker = normalize_ticker(ticker)?;
        let date = date_to_unix(expiration).to_string();
        let resp = self.get_options(&ticker, &[("date", date.as_str())]).await?;

        let chain = chain_from_options(&ticker, expiration, resp)?;
        tracing::debug!(
            ticker = %ticker,
            expiration = %expiration,
            calls = chain.calls.len(),
            puts = chain.puts.len(),
            "option chain fetched"
        );
        Ok(chain)
    }
}

/// Trimmed, upper-cased symbol. Restricted to characters that appear in
/// exchange tickers so it can be spliced into a URL path.
pub fn normalize_ticker(raw: &str) -> AppResult<String> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(AppError::invalid("ticker must not be empty"));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=');
    if ticker.len() > 16 || !ticker.chars().all(allowed) {
        return Err(AppError::invalid(format!("invalid ticker: {raw:?}")));
    }
    Ok(ticker)
}

fn query(params: &[(&str, &str)]) -> String {
    let parts: SmallVec<[String; 4]> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
    if parts.is_empty() { String::new() } else { format!("?{}", parts.join("&")) }
}

/// The crumb endpoint answers in plain text. An HTML body or anything
/// outside the URL-safe set means the cookie was refused.
fn parse_crumb(body: &str) -> AppResult<String> {
    let crumb = body.trim();
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '/' | '_' | '-');
    if crumb.is_empty() || crumb.len() > 64 || !crumb.chars().all(allowed) {
        return Err(AppError::MarketData {
            status: 200,
            body: format!("unusable crumb: {:?}", crumb.chars().take(64).collect::<String>()),
        });
    }
    Ok(crumb.to_string())
}

fn is_stale_crumb(err: &AppError) -> bool {
    matches!(err, AppError::MarketData { status: 401, .. })
}

fn spot_from_chart(ticker: &str, resp: ChartResponse) -> AppResult<f64> {
    let envelope = resp
        .chart
        .ok_or_else(|| AppError::Parse("chart response missing `chart`".into()))?;

    if let Some(err) = envelope.error {
        return Err(AppError::Unavailable(format!("{ticker}: {err}")));
    }

    let price = envelope
        .result
        .as_ref()
        .and_then(|r| r.first())
        .and_then(|r| r.last_price())
        .ok_or_else(|| AppError::Unavailable(format!("no price data for {ticker}")))?;

    if price <= 0.0 || !price.is_finite() {
        return Err(AppError::MarketData {
            status: 200,
            body: format!("invalid spot price for {ticker}: {price}"),
        });
    }
    Ok(price)
}

fn options_result(ticker: &str, resp: OptionsResponse) -> AppResult<OptionsResult> {
    let envelope = resp
        .option_chain
        .ok_or_else(|| AppError::Parse("options response missing `optionChain`".into()))?;

    if let Some(err) = envelope.error {
        return Err(AppError::Unavailable(format!("{ticker}: {err}")));
    }

    envelope
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| AppError::Unavailable(format!("no option data for {ticker}")))
}

fn chain_from_options(
    ticker: &str,
    expiration: NaiveDate,
    resp: OptionsResponse,
) -> AppResult<OptionChain> {
    let result = options_result(ticker, resp)?;

    // The API answers an unknown date with the nearest expiry; reject it
    let by_expiry = result
        .options
        .unwrap_or_default()
        .into_iter()
        .find(|o| o.expiration_date.and_then(unix_to_date) == Some(expiration))
        .ok_or_else(|| {
            AppError::Unavailable(format!("no option data for {ticker} expiring {expiration}"))
        })?;

    let chain = OptionChain::new(
        ticker,
        expiration,
        by_expiry.calls.unwrap_or_default(),
        by_expiry.puts.unwrap_or_default(),
    );

    if chain.is_empty() {
        return Err(AppError::Unavailable(format!(
            "no option data available for {ticker} expiring {expiration}"
        )));
    }
    Ok(chain)
}
