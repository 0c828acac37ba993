//! Weather station data source.
//!
//! Fetches the latest reading from the UNLP Facultad de Informática station.
//! Every call goes to the network; there is no cache and no retry.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::ClimaError;

/// Fixed station endpoint. Only the `lang` flag is ever sent.
pub const STATION_URL: &str = "https://clima.info.unlp.edu.ar/last?lang=es";

/// Upper bound on a single fetch, surfaced as `UpstreamUnavailable` when hit.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Static metadata about the station.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StationInfo {
    pub station: &'static str,
    pub location: &'static str,
}

pub const STATION: StationInfo = StationInfo {
    station: "Facultad de Informática UNLP",
    location: "La Plata, Argentina",
};

/// One point-in-time snapshot of station measurements, exactly as the station reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub captured_at: String,
    pub temperature: f64,
    pub humidity: f64,
    pub dew: f64,
    pub bar: f64,
    pub uv: f64,
    pub wind_chill: f64,
    pub wind_speed: f64,
    pub rain: f64,
    pub rain_rate: f64,
    pub wind_direction: String,
}

/// Anything that can produce a fresh reading.
///
/// Object-safe so the registry can hold `Arc<dyn ReadingSource>` and tests can
/// substitute a fixed or failing source.
pub trait ReadingSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, crate::Result<WeatherReading>>;
}

/// HTTP client for the station endpoint.
#[derive(Debug, Clone)]
pub struct StationClient {
    client: reqwest::Client,
    url: String,
}

impl StationClient {
    /// Client for the fixed production endpoint.
    pub fn new() -> crate::Result<Self> {
        Self::with_url(STATION_URL)
    }

    /// Client for an arbitrary endpoint serving the same payload (mock servers in tests).
    pub fn with_url(url: impl Into<String>) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("clima-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClimaError::UpstreamUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Perform one GET against the station and decode the body.
    pub async fn fetch_reading(&self) -> crate::Result<WeatherReading> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ClimaError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %self.url, status = status.as_u16(), "station returned error status");
            return Err(ClimaError::UpstreamError(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClimaError::UpstreamUnavailable(e.to_string()))?;

        let reading: WeatherReading = serde_json::from_str(&body)
            .map_err(|e| ClimaError::MalformedPayload(e.to_string()))?;

        tracing::debug!(captured_at = %reading.captured_at, "fetched station reading");
        Ok(reading)
    }
}

impl ReadingSource for StationClient {
    fn fetch(&self) -> BoxFuture<'_, crate::Result<WeatherReading>> {
        Box::pin(self.fetch_reading())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// A plausible reading with every analyzer rule in its neutral range.
    pub fn neutral_reading() -> WeatherReading {
        WeatherReading {
            captured_at: "2025-07-14T15:30:00Z".to_string(),
            temperature: 18.0,
            humidity: 50.0,
            dew: 7.5,
            bar: 1016.0,
            uv: 1.0,
            wind_chill: 18.0,
            wind_speed: 10.0,
            rain: 0.0,
            rain_rate: 0.0,
            wind_direction: "NNE".to_string(),
        }
    }

    /// What a stub source answers with.
    #[derive(Clone)]
    pub enum Outcome {
        Reading(WeatherReading),
        Status(u16),
        Unreachable,
    }

    /// In-memory source that counts how often it was asked.
    pub struct StubSource {
        outcome: Outcome,
        calls: AtomicUsize,
    }

    impl StubSource {
        pub fn new(outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn reading(reading: WeatherReading) -> Arc<Self> {
            Self::new(Outcome::Reading(reading))
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ReadingSource for StubSource {
        fn fetch(&self) -> BoxFuture<'_, crate::Result<WeatherReading>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = match &self.outcome {
                Outcome::Reading(r) => Ok(r.clone()),
                Outcome::Status(code) => Err(ClimaError::UpstreamError(*code)),
                Outcome::Unreachable => Err(ClimaError::UpstreamUnavailable(
                    "connection refused".to_string(),
                )),
            };
            Box::pin(async move { result })
        }
    }
}
