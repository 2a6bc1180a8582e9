use crate::config::ForecastConfig;
use crate::error::{TrendError, TrendResult};
use crate::fit::{Statistic, TrendFit};
use crate::forecast::TrendForecast;
use crate::limits::{LimitKind, LimitOverride, Threshold};
use crate::predict::CrossingResult;
use crate::resample::AggregateWindow;
use crate::sources::Sources;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdCrossing {
    pub kind: LimitKind,
    pub threshold: Threshold,
    pub limit: f64,
    pub result: CrossingResult,
}

/// Everything the forecast can say about one MSID.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MsidReport {
    pub msid: String,
    pub windows: usize,
    pub latest_window: Option<AggregateWindow>,
    pub max_fit: TrendFit,
    pub min_fit: TrendFit,
    pub overrides: Vec<LimitOverride>,
    pub crossings: Vec<ThresholdCrossing>,
}

impl MsidReport {
    pub fn from_forecast(forecast: &TrendForecast) -> TrendResult<Self> {
        let windows = forecast.windows()?;
        let max_fit = forecast.fit(Statistic::Max)?;
        let min_fit = forecast.fit(Statistic::Min)?;

        let mut crossings = Vec::new();
        for kind in [LimitKind::Safety, LimitKind::Trending] {
            let Some(limits) = forecast.limits(kind) else {
                continue;
            };
            for threshold in Threshold::ALL {
                crossings.push(ThresholdCrossing {
                    kind,
                    threshold,
                    limit: limits.get(threshold),
                    result: forecast.crossing_date(threshold, kind)?,
                });
            }
        }

        Ok(Self {
            msid: forecast.msid().to_string(),
            windows: windows.len(),
            latest_window: windows.last().copied(),
            max_fit,
            min_fit,
            overrides: forecast.overrides().to_vec(),
            crossings,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MsidOutcome {
    pub msid: String,
    pub result: Result<MsidReport, TrendError>,
}

fn forecast_one(msid: &str, config: &ForecastConfig, sources: &Sources) -> TrendResult<MsidReport> {
    let forecast = TrendForecast::build(msid, config.clone(), sources)?;
    MsidReport::from_forecast(&forecast)
}

async fn forecast_gated(
    msid: String,
    semaphore: Arc<Semaphore>,
    config: Arc<ForecastConfig>,
    sources: Sources,
) -> TrendResult<MsidReport> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|_| TrendError::Failed {
            msid: msid.clone(),
            reason: "forecast concurrency gate closed".to_string(),
        })?;
    let task_msid = msid.clone();
    tokio::task::spawn_blocking(move || forecast_one(&task_msid, &config, &sources))
        .await
        .map_err(|err| TrendError::Failed {
            msid,
            reason: format!("forecast task aborted: {err}"),
        })?
}

/// Forecasts every MSID on the blocking pool, at most `max_concurrency` at a
/// time. Outcomes come back in input order.
pub async fn run_batch(msids: Vec<String>, config: ForecastConfig, sources: Sources) -> Vec<MsidOutcome> {
    let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
    let config = Arc::new(config);

    let mut handles = Vec::with_capacity(msids.len());
    for msid in msids {
        let semaphore = semaphore.clone();
        let config = config.clone();
        let sources = sources.clone();
        let handle = tokio::spawn(forecast_gated(msid.clone(), semaphore, config, sources));
        handles.push((msid, handle));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    let mut failed = 0usize;
    for (msid, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => Err(TrendError::Failed {
                msid: msid.clone(),
                reason: format!("forecast task aborted: {err}"),
            }),
        };
        if let Err(err) = &result {
            failed += 1;
            tracing::warn!(msid = %msid, code = err.code(), "trend forecast failed: {err}");
        }
        outcomes.push(MsidOutcome { msid, result });
    }

    tracing::info!(total = outcomes.len(), failed, "batch forecast complete");
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::limits::{LimitOrigin, LimitSet};
    use crate::sources::TelemetryFetch;
    use crate::test_support::{daily_series, MemoryArchive, StaticLimits};

    fn rising(msid: &str) -> crate::series::TimeSeries {
        let times: Vec<f64> = (-1..60).map(|i| i as f64).collect();
        daily_series(msid, &times, |t| 10.0 + t)
    }

    fn sources(archive: Arc<MemoryArchive>) -> Sources {
        let limits = LimitSet::new(LimitOrigin::Tdb, 0.0, 5.0, 90.0, 100.0);
        let telemetry: Arc<dyn TelemetryFetch> = archive;
        Sources {
            telemetry,
            primary_limits: Arc::new(
                StaticLimits::new()
                    .with_limits("tephin", limits)
                    .with_limits("pm1thv2t", limits),
            ),
            secondary_limits: Arc::new(StaticLimits::new()),
            trending_limits: None,
        }
    }

    #[tokio::test]
    async fn outcomes_keep_input_order_and_isolate_failures() {
        let archive = Arc::new(
            MemoryArchive::new()
                .with_series(rising("tephin"))
                .with_series(rising("pm1thv2t"))
                .with_failure("broken", SourceError::Unavailable("archive offline".to_string())),
        );
        let msids: Vec<String> = ["tephin", "broken", "unknown", "pm1thv2t"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let outcomes = run_batch(msids, ForecastConfig::default(), sources(archive.clone())).await;

        let order: Vec<&str> = outcomes.iter().map(|o| o.msid.as_str()).collect();
        assert_eq!(order, vec!["tephin", "broken", "unknown", "pm1thv2t"]);
        assert_eq!(archive.fetch_count(), 4);

        let report = outcomes[0].result.as_ref().unwrap();
        assert_eq!(report.windows, 2);
        assert!((report.max_fit.slope - 1.0).abs() < 1e-12);
        assert_eq!(report.crossings.len(), 4);
        assert!(report.crossings.iter().all(|c| c.kind == LimitKind::Safety));
        let warning_high = report
            .crossings
            .iter()
            .find(|c| c.threshold == Threshold::WarningHigh)
            .unwrap();
        assert_eq!(warning_high.limit, 100.0);
        assert!((warning_high.result.seconds().unwrap() - 74.5).abs() < 1e-6);

        assert_eq!(outcomes[1].result.as_ref().unwrap_err().code(), "source_failed");
        assert_eq!(outcomes[2].result.as_ref().unwrap_err().code(), "insufficient_data");
        assert!(outcomes[3].result.is_ok());
    }

    #[tokio::test]
    async fn single_permit_still_runs_every_msid() {
        let archive = Arc::new(MemoryArchive::new().with_series(rising("tephin")));
        let config = ForecastConfig {
            max_concurrency: 1,
            ..ForecastConfig::default()
        };
        let msids = vec!["tephin".to_string(); 3];
        let outcomes = run_batch(msids, config, sources(archive.clone())).await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        assert_eq!(archive.fetch_count(), 3);
    }

    #[tokio::test]
    async fn empty_batch_returns_nothing() {
        let archive = Arc::new(MemoryArchive::new());
        let outcomes = run_batch(Vec::new(), ForecastConfig::default(), sources(archive)).await;
        assert!(outcomes.is_empty());
    }

    #[test]
    fn report_serializes_crossing_kinds() {
        let crossing = ThresholdCrossing {
            kind: LimitKind::Trending,
            threshold: Threshold::CautionHigh,
            limit: 42.0,
            result: CrossingResult::BeyondHorizon,
        };
        let value = serde_json::to_value(&crossing).unwrap();
        assert_eq!(value["kind"], "trending");
        assert_eq!(value["threshold"], "caution_high");
        assert_eq!(value["result"]["kind"], "beyond_horizon");
    }
}
