//! Metric Samples and Exposition
//!
//! Device data travels through the exporter as plain [`MetricSample`] values.
//! They are only turned into Prometheus collectors when a response is rendered:
//! each scrape gets a fresh [`Registry`], so series of a device that vanished
//! since the previous scrape disappear with it.
//!
//! # Metric Types
//!
//! - **Gauge**: current readings, health codes, info metrics
//! - **Counter**: monotonically accumulating device readings
//!
//! Exporter self-observability lives in [`ExporterMetrics`] under the
//! `redfish_exporter_` namespace and persists across scrapes.

pub mod vocabulary;

use crate::collector::TargetStatus;
use crate::scrape::ScrapeResult;
use prometheus::{
    CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// A metric name from the fixed vocabulary, with its label names in order.
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDef {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub labels: &'static [&'static str],
}

pub type Labels = BTreeMap<String, String>;

/// One normalized observation
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub def: &'static MetricDef,
    pub value: f64,
    pub labels: Labels,
}

impl MetricSample {
    pub fn new<I, K, V>(def: &'static MetricDef, value: f64, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            def,
            value,
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    /// Adds `extra` labels the sample does not already carry.
    pub fn with_labels(mut self, extra: &Labels) -> Self {
        for (name, value) in extra {
            self.labels
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    /// Series identity: name plus label set.
    pub fn series(&self) -> (&'static str, &Labels) {
        (self.def.name, &self.labels)
    }
}

/// Renders samples in the Prometheus text format.
///
/// Families and series come out sorted, so identical input renders
/// identically. A family's label names are the vocabulary's followed by any
/// extra (operator) labels its samples carry; names missing from a sample
/// render as empty values.
pub fn render(samples: &[MetricSample]) -> anyhow::Result<String> {
    let registry = Registry::new();
    let mut gauges: HashMap<&'static str, GaugeVec> = HashMap::new();
    let mut counters: HashMap<&'static str, CounterVec> = HashMap::new();
    let label_names = family_labels(samples);

    for sample in samples {
        let def = sample.def;
        let names = &label_names[def.name];
        let values: Vec<&str> = names
            .iter()
            .map(|name| sample.label(name).unwrap_or_default())
            .collect();

        match def.kind {
            MetricKind::Gauge => {
                let vec = match gauges.entry(def.name) {
                    Entry::Occupied(e) => e.into_mut(),
                    Entry::Vacant(e) => {
                        let vec = GaugeVec::new(Opts::new(def.name, def.help), names)?;
                        registry.register(Box::new(vec.clone()))?;
                        e.insert(vec)
                    }
                };
                vec.with_label_values(&values).set(sample.value);
            }
            MetricKind::Counter => {
                // Counters cannot go negative
                if !sample.value.is_finite() || sample.value < 0.0 {
                    continue;
                }
                let vec = match counters.entry(def.name) {
                    Entry::Occupied(e) => e.into_mut(),
                    Entry::Vacant(e) => {
                        let vec = CounterVec::new(Opts::new(def.name, def.help), names)?;
                        registry.register(Box::new(vec.clone()))?;
                        e.insert(vec)
                    }
                };
                vec.with_label_values(&values).inc_by(sample.value);
            }
        }
    }

    encode(&registry)
}

fn family_labels(samples: &[MetricSample]) -> HashMap<&'static str, Vec<&str>> {
    let mut extra: HashMap<&'static str, BTreeSet<&str>> = HashMap::new();
    for sample in samples {
        let names = extra.entry(sample.name()).or_default();
        names.extend(
            sample
                .labels
                .keys()
                .map(String::as_str)
                .filter(|name| !sample.def.labels.contains(name)),
        );
    }

    samples
        .iter()
        .map(|sample| {
            let def = sample.def;
            let mut names: Vec<&str> = def.labels.to_vec();
            names.extend(extra.get(def.name).into_iter().flatten().copied());
            (def.name, names)
        })
        .collect()
}

fn encode(registry: &Registry) -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Exporter self-metrics
#[derive(Clone)]
pub struct ExporterMetrics {
    registry: Arc<Registry>,

    pub scrapes_total: Arc<IntCounter>,
    pub scrape_failures_total: Arc<IntCounter>,
    pub scrape_duration_seconds: Arc<Histogram>,
    pub target_polls_total: Arc<IntCounterVec>,
}

impl ExporterMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let scrapes_total = IntCounter::with_opts(
            Opts::new("scrapes_total", "Scrape requests served").namespace("redfish_exporter"),
        )?;

        let scrape_failures_total = IntCounter::with_opts(
            Opts::new(
                "scrape_failures_total",
                "Scrape requests that could not produce any result",
            )
            .namespace("redfish_exporter"),
        )?;

        let scrape_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "scrape_duration_seconds",
                "Wall-clock time of a complete scrape",
            )
            .namespace("redfish_exporter")
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;

        let target_polls_total = IntCounterVec::new(
            Opts::new("target_polls_total", "Target polls by outcome")
                .namespace("redfish_exporter"),
            &["status"],
        )?;

        registry.register(Box::new(scrapes_total.clone()))?;
        registry.register(Box::new(scrape_failures_total.clone()))?;
        registry.register(Box::new(scrape_duration_seconds.clone()))?;
        registry.register(Box::new(target_polls_total.clone()))?;

        // One series per outcome from the start, so rates never see a gap
        for status in TargetStatus::ALL {
            target_polls_total.with_label_values(&[status.as_str()]);
        }

        Ok(Self {
            registry: Arc::new(registry),
            scrapes_total: Arc::new(scrapes_total),
            scrape_failures_total: Arc::new(scrape_failures_total),
            scrape_duration_seconds: Arc::new(scrape_duration_seconds),
            target_polls_total: Arc::new(target_polls_total),
        })
    }

    pub fn observe(&self, result: &ScrapeResult) {
        self.scrapes_total.inc();
        self.scrape_duration_seconds
            .observe(result.elapsed().as_secs_f64());
        for outcome in result.outcomes() {
            self.target_polls_total
                .with_label_values(&[outcome.status.as_str()])
                .inc();
        }
    }

    pub fn observe_failure(&self) {
        self.scrapes_total.inc();
        self.scrape_failures_total.inc();
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        encode(&self.registry)
    }
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create exporter metrics")
    }
}
