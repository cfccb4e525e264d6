//! Worker metrics: a load figure, named gauges and named histograms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One histogram bucket: observations with `value <= upper_bound`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub upper_bound: f64,
    pub samples: u32,
}

/// A cumulative histogram with fixed bucket bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramMetric {
    buckets: Vec<HistogramBucket>,
    sum: f64,
}

impl HistogramMetric {
    /// Create a histogram over `bounds`. A final `+inf` bucket is always
    /// appended, so every observation lands in at least one bucket.
    #[must_use]
    pub fn new(bounds: impl IntoIterator<Item = f64>) -> Self {
        let mut buckets: Vec<HistogramBucket> = bounds
            .into_iter()
            .map(|upper_bound| HistogramBucket {
                upper_bound,
                samples: 0,
            })
            .collect();
        buckets.push(HistogramBucket {
            upper_bound: f64::INFINITY,
            samples: 0,
        });
        Self { buckets, sum: 0.0 }
    }

    /// Rebuild a histogram from received buckets, as-is.
    #[must_use]
    pub fn from_parts(buckets: Vec<HistogramBucket>, sum: f64) -> Self {
        Self { buckets, sum }
    }

    pub fn record_observation(&mut self, value: f64) {
        for bucket in &mut self.buckets {
            if value <= bucket.upper_bound {
                bucket.samples = bucket.samples.saturating_add(1);
            }
        }
        self.sum += value;
    }

    /// Zero every bucket and the sum, keeping the bounds.
    pub fn clear_observations(&mut self) {
        for bucket in &mut self.buckets {
            bucket.samples = 0;
        }
        self.sum = 0.0;
    }

    #[must_use]
    pub fn buckets(&self) -> &[HistogramBucket] {
        &self.buckets
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.sum
    }
}

impl Default for HistogramMetric {
    fn default() -> Self {
        Self::new([])
    }
}

/// Metrics reported by or to a worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Load in `[0, 1]` where the runtime balances work; `None` if unreported.
    pub load: Option<f64>,
    pub gauge_metrics: BTreeMap<String, f64>,
    pub histogram_metrics: BTreeMap<String, HistogramMetric>,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_load(mut self, load: f64) -> Self {
        self.load = Some(load);
        self
    }

    pub fn set_gauge(&mut self, name: impl Into<String>, value: f64) {
        self.gauge_metrics.insert(name.into(), value);
    }

    /// The histogram called `name`, created over `bounds` if absent.
    pub fn histogram(
        &mut self,
        name: impl Into<String>,
        bounds: impl IntoIterator<Item = f64>,
    ) -> &mut HistogramMetric {
        self.histogram_metrics
            .entry(name.into())
            .or_insert_with(|| HistogramMetric::new(bounds))
    }

    /// Fold `other` into `self`: its load replaces ours when present, and its
    /// gauges and histograms overwrite ours by name.
    pub fn merge(&mut self, other: &Metrics) {
        if other.load.is_some() {
            self.load = other.load;
        }
        for (name, value) in &other.gauge_metrics {
            self.gauge_metrics.insert(name.clone(), *value);
        }
        for (name, histogram) in &other.histogram_metrics {
            self.histogram_metrics.insert(name.clone(), histogram.clone());
        }
    }

    /// Clear every histogram's observations, e.g. once they have been reported.
    pub fn clear_histogram_observations(&mut self) {
        for histogram in self.histogram_metrics.values_mut() {
            histogram.clear_observations();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_is_cumulative() {
        let mut histogram = HistogramMetric::new([1.0, 5.0]);
        assert_eq!(histogram.buckets().len(), 3);
        assert!(histogram.buckets()[2].upper_bound.is_infinite());

        histogram.record_observation(0.5);
        histogram.record_observation(3.0);
        histogram.record_observation(100.0);

        let samples: Vec<u32> = histogram.buckets().iter().map(|b| b.samples).collect();
        assert_eq!(samples, vec![1, 2, 3]);
        assert_eq!(histogram.sum(), 103.5);
    }

    #[test]
    fn test_boundary_value_is_inclusive() {
        let mut histogram = HistogramMetric::new([1.0]);
        histogram.record_observation(1.0);
        assert_eq!(histogram.buckets()[0].samples, 1);
    }

    #[test]
    fn test_clear_observations_keeps_bounds() {
        let mut histogram = HistogramMetric::new([2.0]);
        histogram.record_observation(1.0);
        histogram.clear_observations();
        assert_eq!(histogram.sum(), 0.0);
        assert!(histogram.buckets().iter().all(|b| b.samples == 0));
        assert_eq!(histogram.buckets()[0].upper_bound, 2.0);
    }

    #[test]
    fn test_merge_overwrites_by_key() {
        let mut base = Metrics::new().with_load(0.2);
        base.set_gauge("entities", 10.0);
        base.set_gauge("fps", 60.0);

        let mut update = Metrics::new();
        update.set_gauge("fps", 30.0);
        update.histogram("latency", [0.1]).record_observation(0.05);
        base.merge(&update);

        assert_eq!(base.load, Some(0.2));
        assert_eq!(base.gauge_metrics["entities"], 10.0);
        assert_eq!(base.gauge_metrics["fps"], 30.0);
        assert_eq!(base.histogram_metrics["latency"].buckets()[0].samples, 1);

        base.merge(&Metrics::new().with_load(0.9));
        assert_eq!(base.load, Some(0.9));
    }

    #[test]
    fn test_clear_histogram_observations() {
        let mut metrics = Metrics::new();
        metrics.histogram("tick", [1.0]).record_observation(0.5);
        metrics.clear_histogram_observations();
        assert_eq!(metrics.histogram_metrics["tick"].sum(), 0.0);
    }
}
