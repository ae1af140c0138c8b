use crate::config::AppConfig;
use crate::feeds::market_data::MarketDataClient;
use crate::models::black_scholes::BlackScholes;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ── Performance Counters (lock-free) ──

pub struct PerfCounters {
    pub requests_served: AtomicU64,
    pub options_priced: AtomicU64,
    pub payoff_curves: AtomicU64,
    pub market_data_calls: AtomicU64,
    pub errors: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            requests_served: AtomicU64::new(0),
            options_priced: AtomicU64::new(0),
            payoff_curves: AtomicU64::new(0),
            market_data_calls: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> serde_json::Value {
        use portable_atomic::Ordering::Relaxed;
        serde_json::json!({
            "requests_served": self.requests_served.load(Relaxed),
            "options_priced": self.options_priced.load(Relaxed),
            "payoff_curves": self.payoff_curves.load(Relaxed),
            "market_data_calls": self.market_data_calls.load(Relaxed),
            "errors": self.errors.load(Relaxed),
        })
    }
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}

// ── Application shared state ──
// Mutated after startup only through the atomics and the client's crumb cache.

pub struct AppState {
    pub config: AppConfig,
    pub market: MarketDataClient,
    pub pricer: BlackScholes,
    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(config: AppConfig) -> Arc<Self> {
        let market = MarketDataClient::new(
            &config.market_data_base_url,
            &config.market_data_cookie_url,
            config.http_timeout_secs,
        );
        Arc::new(Self {
            config,
            market,
            pricer: BlackScholes::new(),
            counters: PerfCounters::new(),
        })
    }
}
