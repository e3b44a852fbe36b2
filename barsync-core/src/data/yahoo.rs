//! Yahoo Finance provider gateway.
//!
//! Fetches OHLCV bars from Yahoo's v8 chart API for any supported interval.
//! One HTTP attempt per call: retrying is the fleet orchestrator's decision,
//! not the gateway's. Every error is scoped to the call that produced it, so
//! a refused or throttled symbol never blocks requests for other symbols.
//!
//! Timestamps carry the exchange's current `gmtoffset` from the response
//! meta, applied to every bar of that response. For exchanges that observe
//! daylight saving, bars from the other side of a transition get the wrong
//! offset, and a daily bar floored to local midnight can land on a different
//! instant than the same bar fetched in another season. Exchanges without
//! DST (NSE, BSE) are unaffected.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::provider::{DataError, FetchRequest, ProviderGateway};
use super::retention::{policy_for, QueryKind};
use crate::domain::{Bar, BarTimestamp, Interval};
use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const CHART_ENDPOINT: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance provider gateway.
pub struct YahooGateway {
    client: reqwest::blocking::Client,
}

impl YahooGateway {
    pub fn new() -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Build the chart API URL for a symbol, interval and range selector.
    fn chart_url(
        symbol: &str,
        interval: Interval,
        request: FetchRequest,
        now: DateTime<Utc>,
    ) -> String {
        let range = match request {
            FetchRequest::Since(start) => {
                let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
                format!("period1={start_ts}&period2={}", now.timestamp())
            }
            FetchRequest::Period(limit) => format!("range={}", limit.range_code()),
        };
        format!(
            "{CHART_ENDPOINT}/{symbol}?{range}&interval={}&includeAdjustedClose=true",
            interval.code()
        )
    }

    /// Parse the chart API response into bars.
    ///
    /// Prices are back-adjusted with the adjusted close when the provider
    /// supplies one. Daily-and-coarser timestamps are floored to local
    /// midnight so one trading day maps to one stable key.
    fn parse_response(
        symbol: &str,
        interval: Interval,
        resp: ChartResponse,
    ) -> Result<Vec<Bar>, DataError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }
                } else {
                    DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
            } else {
                DataError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        // No timestamps: the range holds no trading sessions.
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        // Current offset only; the response carries no per-bar offsets.
        let gmtoffset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
        let offset = FixedOffset::east_opt(gmtoffset).ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("invalid gmtoffset: {gmtoffset}"))
        })?;
        let floor_to_day = policy_for(interval).kind == QueryKind::BoundedStart;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let utc = DateTime::from_timestamp(ts, 0).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;
            let mut local = utc.with_timezone(&offset);
            if floor_to_day {
                let midnight = local.date_naive().and_time(NaiveTime::MIN);
                local = offset.from_local_datetime(&midnight).single().unwrap_or(local);
            }

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Skip rows where all OHLCV are None (holidays/non-trading slots)
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            let ratio = match (
                adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten()),
                close,
            ) {
                (Some(adj), Some(c)) if c != 0.0 => adj / c,
                _ => 1.0,
            };

            bars.push(Bar {
                timestamp: BarTimestamp::Aware(local),
                open: open.map_or(f64::NAN, |v| v * ratio),
                high: high.map_or(f64::NAN, |v| v * ratio),
                low: low.map_or(f64::NAN, |v| v * ratio),
                close: close.map_or(f64::NAN, |v| v * ratio),
                volume: volume.unwrap_or(0),
            });
        }

        Ok(bars)
    }

    /// Execute a single HTTP request.
    fn fetch_once(
        &self,
        symbol: &str,
        interval: Interval,
        request: FetchRequest,
    ) -> Result<Vec<Bar>, DataError> {
        let url = Self::chart_url(symbol, interval, request, Utc::now());
        debug!(%url, "requesting chart");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
        let status = resp.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DataError::AuthenticationRequired(format!(
                "Yahoo Finance refused {symbol} (HTTP {status})"
            )));
        }

        // Yahoo answers unknown symbols with 404 and an error body.
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::Other(format!("HTTP {status} for {symbol}")));
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        Self::parse_response(symbol, interval, chart)
    }
}

impl ProviderGateway for YahooGateway {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        symbol: &str,
        interval: Interval,
        request: FetchRequest,
    ) -> Result<Vec<Bar>, DataError> {
        self.fetch_once(symbol, interval, request)
    }
}
