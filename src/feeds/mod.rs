// Feed Boundary Module
// Typed boundaries for the external collaborators. The core speaks no
// wire protocol; sources are async traits the runtime implements, and the
// aggregator fans them in with per-call deadlines before a tick starts.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::config::OracleConfig;
use crate::errors::{OracleError, OracleResult};
use crate::kalman::weighted_trimmed_median;
use crate::models::leverage::LeverageState;
use crate::models::quote::VenueQuote;
use crate::oracle::OracleInput;
use crate::stablecoins::StablecoinFlowData;

/// Hourly stablecoin flow arrays are normalized to this length.
const HOURLY_FLOW_LEN: usize = 24;

/// Median-price samples retained for return and volatility estimation.
const PRICE_HISTORY_LEN: usize = 256;

/// Produces per-venue quotes each tick. Venues that fail to report are
/// simply omitted from the observation vector.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_quotes(&self) -> OracleResult<Vec<VenueQuote>>;
}

/// Produces a single leverage state per tick. Required.
#[async_trait]
pub trait DerivativesSource: Send + Sync {
    async fn fetch_leverage_state(&self) -> OracleResult<LeverageState>;
}

/// Produces one stablecoin flow snapshot per tick. Required.
#[async_trait]
pub trait FlowSource: Send + Sync {
    async fn fetch_flow_data(&self) -> OracleResult<StablecoinFlowData>;
}

/// Optional on-chain realized price.
#[async_trait]
pub trait RealizedPriceSource: Send + Sync {
    async fn fetch_realized_price(&self) -> OracleResult<f64>;
}

/// Optional per-venue order-book quality in [0, 1]; missing entries
/// default to 1.0 downstream.
#[async_trait]
pub trait OrderbookQualitySource: Send + Sync {
    async fn fetch_qualities(&self) -> OracleResult<HashMap<String, f64>>;
}

/// Aggregated venue prices with spread diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedQuotes {
    pub venue_prices: HashMap<String, f64>,
    pub median_price: f64,
    pub trimmed_median_price: f64,
    /// Max spread across venues in basis points
    pub spread_bps: f64,
    pub num_venues: usize,
}

/// Fans in all sources and assembles the input for one oracle tick.
/// Maintains a small median-price history to derive the 5-minute return
/// and a realized-volatility proxy.
pub struct FeedAggregator {
    config: Arc<OracleConfig>,
    quote_sources: Vec<Arc<dyn QuoteSource>>,
    derivatives_source: Arc<dyn DerivativesSource>,
    flow_source: Arc<dyn FlowSource>,
    realized_price_source: Option<Arc<dyn RealizedPriceSource>>,
    orderbook_quality_source: Option<Arc<dyn OrderbookQualitySource>>,
    deadline: Duration,
    /// (unix seconds, median price), oldest first
    price_history: VecDeque<(i64, f64)>,
}

impl FeedAggregator {
    pub fn new(
        config: Arc<OracleConfig>,
        quote_sources: Vec<Arc<dyn QuoteSource>>,
        derivatives_source: Arc<dyn DerivativesSource>,
        flow_source: Arc<dyn FlowSource>,
    ) -> Self {
        Self {
            config,
            quote_sources,
            derivatives_source,
            flow_source,
            realized_price_source: None,
            orderbook_quality_source: None,
            deadline: Duration::from_secs(10),
            price_history: VecDeque::with_capacity(PRICE_HISTORY_LEN),
        }
    }

    pub fn with_realized_price_source(mut self, source: Arc<dyn RealizedPriceSource>) -> Self {
        self.realized_price_source = Some(source);
        self
    }

    pub fn with_orderbook_quality_source(mut self, source: Arc<dyn OrderbookQualitySource>) -> Self {
        self.orderbook_quality_source = Some(source);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Fetch everything needed for one tick. Required sources must
    /// deliver within the deadline; optional sources degrade to absent
    /// with an informational log line.
    pub async fn fetch(&mut self, now: i64) -> OracleResult<OracleInput> {
        let quotes = self.fetch_all_quotes().await;
        if quotes.venue_prices.is_empty() {
            return Err(OracleError::InsufficientObservations { got: 0, min: 1 });
        }

        let leverage_state = tokio::time::timeout(
            self.deadline,
            self.derivatives_source.fetch_leverage_state(),
        )
        .await
        .map_err(|_| OracleError::FeedUnavailable {
            source_name: "derivatives".to_string(),
            reason: "deadline exceeded".to_string(),
        })??;

        let flow_data = tokio::time::timeout(self.deadline, self.flow_source.fetch_flow_data())
            .await
            .map_err(|_| OracleError::FeedUnavailable {
                source_name: "stablecoin_flows".to_string(),
                reason: "deadline exceeded".to_string(),
            })??;
        let flow_data = pad_hourly_flows(flow_data)?;

        let realized_price = match &self.realized_price_source {
            Some(source) => {
                match tokio::time::timeout(self.deadline, source.fetch_realized_price()).await {
                    Ok(Ok(price)) => Some(price),
                    Ok(Err(e)) => {
                        debug!(error = %e, "realized price source stale, continuing without");
                        None
                    }
                    Err(_) => {
                        debug!("realized price source missed deadline, continuing without");
                        None
                    }
                }
            }
            None => None,
        };

        let orderbook_qualities = match &self.orderbook_quality_source {
            Some(source) => {
                match tokio::time::timeout(self.deadline, source.fetch_qualities()).await {
                    Ok(Ok(qualities)) => Some(qualities),
                    Ok(Err(e)) => {
                        debug!(error = %e, "orderbook quality source stale, continuing without");
                        None
                    }
                    Err(_) => {
                        debug!("orderbook quality source missed deadline, continuing without");
                        None
                    }
                }
            }
            None => None,
        };

        let price_return_5m = self.price_return_5m(now, quotes.median_price);
        let volatility_annualized = self.volatility_annualized();
        self.record_price(now, quotes.median_price);

        Ok(OracleInput {
            venue_prices: quotes.venue_prices,
            leverage_state,
            stablecoin_flow_data: flow_data,
            realized_price,
            orderbook_qualities,
            price_return_5m,
            // No volume source at this boundary; the cascade divergence
            // signal treats zero volume as no divergence
            spot_volume_5m: 0.0,
            volatility_annualized,
        })
    }

    /// Fetch quotes from every source in parallel and aggregate them.
    pub async fn fetch_all_quotes(&self) -> AggregatedQuotes {
        let deadline = self.deadline;
        let fetches = self.quote_sources.iter().map(|source| {
            let source = Arc::clone(source);
            async move {
                let name = source.name().to_string();
                match tokio::time::timeout(deadline, source.fetch_quotes()).await {
                    Ok(Ok(quotes)) => Some(quotes),
                    Ok(Err(e)) => {
                        warn!(source = %name, error = %e, "quote source failed, omitting");
                        None
                    }
                    Err(_) => {
                        warn!(source = %name, "quote source missed deadline, omitting");
                        None
                    }
                }
            }
        });

        let mut venue_prices = HashMap::new();
        for quotes in join_all(fetches).await.into_iter().flatten() {
            for quote in quotes {
                venue_prices.insert(quote.venue, quote.price);
            }
        }

        self.aggregate(venue_prices)
    }

    fn aggregate(&self, venue_prices: HashMap<String, f64>) -> AggregatedQuotes {
        if venue_prices.is_empty() {
            return AggregatedQuotes {
                venue_prices,
                median_price: 0.0,
                trimmed_median_price: 0.0,
                spread_bps: 0.0,
                num_venues: 0,
            };
        }

        let mut named: Vec<(&String, f64)> = venue_prices.iter().map(|(v, p)| (v, *p)).collect();
        named.sort_by(|a, b| a.0.cmp(b.0));

        let prices: Vec<f64> = named.iter().map(|(_, p)| *p).collect();
        let weights: Vec<f64> = named
            .iter()
            .map(|(venue, _)| {
                self.config
                    .venue(venue)
                    .map(|v| v.base_reliability)
                    .unwrap_or(0.5)
            })
            .collect();

        let median_price = statistical::median(&prices);
        let trimmed_median_price =
            weighted_trimmed_median(&prices, &weights, 0.1).unwrap_or(median_price);

        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let spread_bps = if median_price > 0.0 {
            (max - min) / median_price * 10_000.0
        } else {
            0.0
        };

        AggregatedQuotes {
            num_venues: venue_prices.len(),
            venue_prices,
            median_price,
            trimmed_median_price,
            spread_bps,
        }
    }

    /// Return over the last ~5 minutes, from the recorded median history.
    fn price_return_5m(&self, now: i64, current_price: f64) -> f64 {
        let cutoff = now - 300;
        let reference = self
            .price_history
            .iter()
            .rev()
            .find(|(ts, _)| *ts <= cutoff)
            .or_else(|| self.price_history.front());

        match reference {
            Some((_, old_price)) if *old_price > 0.0 => (current_price - old_price) / old_price,
            _ => 0.0,
        }
    }

    /// Annualized realized volatility from per-sample returns of the
    /// median history. Defaults to 0.3 until enough samples accumulate.
    fn volatility_annualized(&self) -> f64 {
        if self.price_history.len() < 10 {
            return 0.3;
        }

        let prices: Vec<f64> = self.price_history.iter().map(|(_, p)| *p).collect();
        let returns: Vec<f64> = prices
            .windows(2)
            .filter(|w| w[0] > 0.0)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect();
        if returns.len() < 2 {
            return 0.3;
        }

        let per_sample_std = statistical::standard_deviation(&returns, None);
        let samples_per_year =
            (365.0 * 24.0 * 3600.0) / self.config.update_interval_seconds.max(1) as f64;
        per_sample_std * samples_per_year.sqrt()
    }

    fn record_price(&mut self, now: i64, price: f64) {
        if self.price_history.len() == PRICE_HISTORY_LEN {
            self.price_history.pop_front();
        }
        self.price_history.push_back((now, price));
    }
}

/// Right-pad an hourly flow history with zeros to the full 24 samples, as
/// the flow boundary guarantees downstream.
pub fn pad_hourly_flows(flow_data: StablecoinFlowData) -> OracleResult<StablecoinFlowData> {
    if flow_data.usdt_hourly_flows.len() >= HOURLY_FLOW_LEN {
        return Ok(flow_data);
    }
    let mut padded = flow_data.usdt_hourly_flows.clone();
    padded.resize(HOURLY_FLOW_LEN, 0.0);

    StablecoinFlowData::builder()
        .usdt(
            flow_data.usdt_mint_volume_24h,
            flow_data.usdt_derivatives_flow,
            flow_data.usdt_spot_flow,
            padded,
        )
        .usdc(
            flow_data.usdc_mint_volume_24h,
            flow_data.usdc_spot_flow,
            flow_data.usdc_custody_flow,
            flow_data.usdc_defi_flow,
            flow_data.usdc_burn_volume_24h,
        )
        .price_context(flow_data.price_return_24h, flow_data.price_direction)
        .build()
}
