//! Cross-rate time series preparation for chart rendering.
//!
//! The engine only produces the numeric series; turning them into pixels
//! is an external collaborator's job.

use std::sync::Arc;

use driftfx_common::Symbol;

use crate::error::{MarketError, MarketResult};
use crate::store::RateStore;

/// Samples emitted for a smoothed curve.
pub const SMOOTH_SAMPLES: usize = 300;

/// One observed cross-rate point. `days_ago` counts backward from today
/// (0) to up to 6 days ago.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub days_ago: u32,
    pub value: f64,
}

/// One point on the densified display curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub days_ago: f64,
    pub value: f64,
}

/// Raw scatter points plus the smoothed curve, ready for rendering.
#[derive(Debug, Clone)]
pub struct ChartData {
    pub scatter: Vec<SeriesPoint>,
    pub curve: Vec<CurvePoint>,
}

/// Finite, non-restartable cross-rate series, emitted oldest first.
///
/// Built over the aligned tails of two histories; each value is how much
/// of the target currency one unit of the source currency bought that day.
#[derive(Debug)]
pub struct CrossSeries {
    from: Vec<f64>,
    to: Vec<f64>,
    index: usize,
}

impl Iterator for CrossSeries {
    type Item = SeriesPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.from.len() {
            return None;
        }
        let i = self.index;
        self.index += 1;
        Some(SeriesPoint {
            days_ago: (self.from.len() - 1 - i) as u32,
            value: self.to[i] / self.from[i],
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.from.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CrossSeries {}

/// Derives display series from the store's rate histories.
pub struct SeriesBuilder {
    store: Arc<RateStore>,
}

impl SeriesBuilder {
    pub fn new(store: Arc<RateStore>) -> Self {
        Self { store }
    }

    /// Cross-rate series for `from`/`to`, aligned from the most recent
    /// entry backward over the shorter of the two histories.
    pub async fn series(&self, from: &Symbol, to: &Symbol) -> MarketResult<CrossSeries> {
        let state = self.store.state.read().await;
        let from_history = state
            .currencies
            .get(from)
            .map(|record| record.history.as_slice())
            .ok_or_else(|| MarketError::NotFound(from.clone()))?;
        let to_history = state
            .currencies
            .get(to)
            .map(|record| record.history.as_slice())
            .ok_or_else(|| MarketError::NotFound(to.clone()))?;

        let len = from_history.len().min(to_history.len());
        Ok(CrossSeries {
            from: from_history[from_history.len() - len..].to_vec(),
            to: to_history[to_history.len() - len..].to_vec(),
            index: 0,
        })
    }

    /// Scatter points plus smoothed curve for one currency pair.
    pub async fn chart(&self, from: &Symbol, to: &Symbol) -> MarketResult<ChartData> {
        let scatter: Vec<SeriesPoint> = self.series(from, to).await?.collect();
        let curve = smooth(&scatter);
        Ok(ChartData { scatter, curve })
    }
}

/// Densify a series for display.
///
/// With at least three points, fits a C1 piecewise-quadratic
/// interpolating spline over the point positions and samples it
/// [`SMOOTH_SAMPLES`] times; with fewer, returns the raw points
/// unchanged. Purely a display aid, never fed back into stored rates.
pub fn smooth(points: &[SeriesPoint]) -> Vec<CurvePoint> {
    if points.len() < 3 {
        return points
            .iter()
            .map(|point| CurvePoint {
                days_ago: f64::from(point.days_ago),
                value: point.value,
            })
            .collect();
    }

    // Positions run oldest first: x = (n - 1) - days_ago
    let n = points.len();
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let ys: Vec<f64> = points.iter().map(|point| point.value).collect();

    quadratic_spline(&xs, &ys, SMOOTH_SAMPLES)
        .into_iter()
        .map(|(x, value)| CurvePoint {
            days_ago: (n - 1) as f64 - x,
            value,
        })
        .collect()
}

/// Interpolating quadratic spline with continuous first derivative.
///
/// Knot slopes follow the recurrence z[i+1] = 2*(y[i+1]-y[i])/h - z[i],
/// starting the first segment from its secant slope; each segment is
/// evaluated as y_i + z_i*dt + (z_{i+1}-z_i)/(2h)*dt^2.
fn quadratic_spline(xs: &[f64], ys: &[f64], samples: usize) -> Vec<(f64, f64)> {
    let n = xs.len();
    debug_assert!(n >= 3);

    let mut slopes = vec![0.0; n];
    slopes[0] = (ys[1] - ys[0]) / (xs[1] - xs[0]);
    for i in 0..n - 1 {
        let h = xs[i + 1] - xs[i];
        slopes[i + 1] = 2.0 * (ys[i + 1] - ys[i]) / h - slopes[i];
    }

    let x_min = xs[0];
    let x_max = xs[n - 1];
    let step = (x_max - x_min) / (samples - 1) as f64;

    let mut curve = Vec::with_capacity(samples);
    let mut segment = 0;
    for s in 0..samples {
        let x = if s == samples - 1 {
            x_max
        } else {
            x_min + step * s as f64
        };
        while segment < n - 2 && x > xs[segment + 1] {
            segment += 1;
        }
        let h = xs[segment + 1] - xs[segment];
        let dt = x - xs[segment];
        let value = ys[segment]
            + slopes[segment] * dt
            + (slopes[segment + 1] - slopes[segment]) / (2.0 * h) * dt * dt;
        curve.push((x, value));
    }
    curve
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryAdapter;
    use crate::store::StoreConfig;

    async fn setup() -> (Arc<RateStore>, SeriesBuilder) {
        let adapter = Arc::new(MemoryAdapter::new());
        let store = Arc::new(
            RateStore::open(adapter, StoreConfig::default())
                .await
                .unwrap(),
        );
        let builder = SeriesBuilder::new(store.clone());
        (store, builder)
    }

    #[tokio::test]
    async fn test_series_unknown_symbol() {
        let (_, builder) = setup().await;
        let err = builder
            .series(&Symbol::new("SOL"), &Symbol::new("XYZ"))
            .await
            .unwrap_err();
        assert_eq!(err, MarketError::NotFound(Symbol::new("XYZ")));
    }

    #[tokio::test]
    async fn test_series_values_and_day_offsets() {
        let (store, builder) = setup().await;
        let sol = Symbol::new("SOL");
        let lun = Symbol::new("LUN");
        store.set_rate(&lun, 3.6).await.unwrap();
        store.set_rate(&lun, 3.7).await.unwrap();

        let points: Vec<SeriesPoint> = builder.series(&sol, &lun).await.unwrap().collect();

        // SOL history is [1.0]; aligned length is 1, the most recent day
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].days_ago, 0);
        assert_eq!(points[0].value, 3.7);
    }

    #[tokio::test]
    async fn test_series_aligns_most_recent_backward() {
        let (store, builder) = setup().await;
        let lun = Symbol::new("LUN");
        let vex = Symbol::new("VEX");
        // LUN: [3.5, 3.6, 3.7]; VEX: [5.2, 5.0]
        store.set_rate(&lun, 3.6).await.unwrap();
        store.set_rate(&lun, 3.7).await.unwrap();
        store.set_rate(&vex, 5.0).await.unwrap();

        let points: Vec<SeriesPoint> = builder.series(&lun, &vex).await.unwrap().collect();

        assert_eq!(points.len(), 2);
        // Oldest first: LUN 3.6 vs VEX 5.2, then LUN 3.7 vs VEX 5.0
        assert_eq!(points[0].days_ago, 1);
        assert!((points[0].value - 5.2 / 3.6).abs() < 1e-12);
        assert_eq!(points[1].days_ago, 0);
        assert!((points[1].value - 5.0 / 3.7).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_series_is_not_restartable() {
        let (_, builder) = setup().await;
        let mut series = builder
            .series(&Symbol::new("SOL"), &Symbol::new("LUN"))
            .await
            .unwrap();

        assert!(series.next().is_some());
        assert!(series.next().is_none());
        // Exhausted for good
        assert!(series.next().is_none());
    }

    #[test]
    fn test_smooth_passes_through_short_series() {
        let points = [
            SeriesPoint {
                days_ago: 1,
                value: 2.0,
            },
            SeriesPoint {
                days_ago: 0,
                value: 2.5,
            },
        ];
        let curve = smooth(&points);
        assert_eq!(curve.len(), 2);
        assert_eq!(curve[0].value, 2.0);
        assert_eq!(curve[1].value, 2.5);
    }

    #[test]
    fn test_smooth_densifies_and_interpolates_knots() {
        let points: Vec<SeriesPoint> = [3.5, 3.8, 3.2, 3.6]
            .iter()
            .enumerate()
            .map(|(i, &value)| SeriesPoint {
                days_ago: (3 - i) as u32,
                value,
            })
            .collect();

        let curve = smooth(&points);
        assert_eq!(curve.len(), SMOOTH_SAMPLES);

        // The spline interpolates: the curve passes through every knot
        for point in &points {
            let nearest = curve
                .iter()
                .min_by(|a, b| {
                    let da = (a.days_ago - f64::from(point.days_ago)).abs();
                    let db = (b.days_ago - f64::from(point.days_ago)).abs();
                    da.partial_cmp(&db).unwrap()
                })
                .unwrap();
            assert!(
                (nearest.value - point.value).abs() < 0.01,
                "curve misses knot at {} days ago",
                point.days_ago
            );
        }

        // Endpoints are exact
        assert!((curve[0].value - 3.5).abs() < 1e-9);
        assert!((curve[SMOOTH_SAMPLES - 1].value - 3.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_chart_emits_parallel_series() {
        let (store, builder) = setup().await;
        let lun = Symbol::new("LUN");
        store.set_rate(&lun, 3.6).await.unwrap();
        store.set_rate(&lun, 3.7).await.unwrap();
        store.set_rate(&Symbol::new("TAR"), 0.9).await.unwrap();
        store.set_rate(&Symbol::new("TAR"), 0.85).await.unwrap();
        store.set_rate(&Symbol::new("TAR"), 0.95).await.unwrap();

        let chart = builder
            .chart(&lun, &Symbol::new("TAR"))
            .await
            .unwrap();

        assert_eq!(chart.scatter.len(), 3);
        assert_eq!(chart.curve.len(), SMOOTH_SAMPLES);
    }
}
