//! Metric Mapper
//!
//! Turns the documents of one walk into metric samples using the static rule
//! table in [`rules`]. The mapper never fails: unknown resource kinds, missing
//! fields and values of the wrong JSON type are simply skipped.
//!
//! # Determinism
//!
//! The output is sorted by metric name and label set. Vendors that repeat a
//! member name inside one array would produce duplicate series; those are
//! collapsed so the result never depends on the order documents were fetched
//! in. Health codes keep the worst state (Critical, Warning, unrecognized, OK),
//! every other metric keeps the smallest value.

pub mod rules;

use crate::metrics::{Labels, MetricSample};
use crate::redfish::types::field_at;
use crate::redfish::ResourceDocument;
use crate::target::Target;
use rules::{is_health, rules_for, Coerce, LabelSource, Rule};
use std::cmp::Ordering;
use serde_json::Value;

/// Maps every document of a walk to samples for `target`.
pub fn map(documents: &[ResourceDocument], target: &Target) -> Vec<MetricSample> {
    let mut samples = Vec::new();

    for document in documents {
        if is_absent(document.body()) {
            continue;
        }
        for rule in rules_for(document.kind()) {
            apply(rule, document, target, &mut samples);
        }
    }

    dedup(samples)
}

fn apply(rule: &Rule, document: &ResourceDocument, target: &Target, out: &mut Vec<MetricSample>) {
    match rule.members {
        None => {
            if let Some(value) = extract(rule, document.body()) {
                let labels = labels(rule, document, document.body(), None, target);
                out.push(sample(rule, value, labels));
            }
        }
        Some(array) => {
            for (index, member) in document.array(array).iter().enumerate() {
                if is_absent(member) {
                    continue;
                }
                if let Some(value) = extract(rule, member) {
                    let labels = labels(rule, document, member, Some(index), target);
                    out.push(sample(rule, value, labels));
                }
            }
        }
    }
}

fn sample(rule: &Rule, value: f64, labels: Labels) -> MetricSample {
    MetricSample {
        def: rule.metric,
        value,
        labels,
    }
}

/// First candidate field that is present and coerces to a value.
fn extract(rule: &Rule, source: &Value) -> Option<f64> {
    rule.fields
        .iter()
        .filter_map(|field| field_at(source, field))
        .find_map(|value| coerce(rule.coerce, value))
}

fn labels(
    rule: &Rule,
    document: &ResourceDocument,
    source: &Value,
    index: Option<usize>,
    target: &Target,
) -> Labels {
    rule.labels
        .iter()
        .map(|(name, label)| {
            let value = match label {
                LabelSource::Target => target.address.clone(),
                LabelSource::Parent(collection) => document
                    .parent_id(collection)
                    .unwrap_or_default()
                    .to_string(),
                LabelSource::ResourceId => document.id().to_string(),
                LabelSource::MemberName => member_name(source, index),
                LabelSource::Field(field) => field_at(source, field)
                    .map(label_text)
                    .unwrap_or_default(),
            };
            (name.to_string(), value)
        })
        .collect()
}

fn member_name(member: &Value, index: Option<usize>) -> String {
    ["Name", "MemberId"]
        .iter()
        .filter_map(|field| field_at(member, field))
        .map(label_text)
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| index.unwrap_or_default().to_string())
}

fn label_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn is_absent(value: &Value) -> bool {
    field_at(value, "Status.State").and_then(Value::as_str) == Some("Absent")
}

/// Converts a raw JSON value according to `coerce`.
pub fn coerce(coerce: Coerce, value: &Value) -> Option<f64> {
    match coerce {
        Coerce::Number => match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite()),
        Coerce::Health => value.as_str().map(health_code),
        Coerce::PowerState => value.as_str().map(power_state_code),
        Coerce::Bool => value.as_bool().map(|b| if b { 1.0 } else { 0.0 }),
        Coerce::Presence => Some(1.0),
    }
}

pub fn health_code(health: &str) -> f64 {
    match health {
        "OK" => 0.0,
        "Warning" => 1.0,
        "Critical" => 2.0,
        _ => -1.0,
    }
}

pub fn power_state_code(state: &str) -> f64 {
    match state {
        "Off" => 0.0,
        "On" => 1.0,
        "PoweringOn" => 2.0,
        "PoweringOff" => 3.0,
        "Paused" => 4.0,
        _ => -1.0,
    }
}

/// Sorts by series and keeps the preferred value of each.
fn dedup(mut samples: Vec<MetricSample>) -> Vec<MetricSample> {
    samples.sort_by(|a, b| {
        a.series()
            .cmp(&b.series())
            .then_with(|| preference(a, b))
    });
    samples.dedup_by(|later, earlier| later.series() == earlier.series());
    samples
}

/// Orders duplicates of one series so the kept sample comes first.
fn preference(a: &MetricSample, b: &MetricSample) -> Ordering {
    if is_health(a.def) {
        severity(b.value).total_cmp(&severity(a.value))
    } else {
        a.value.total_cmp(&b.value)
    }
}

/// Unrecognized health ranks between OK and Warning.
fn severity(code: f64) -> f64 {
    if code < 0.0 {
        0.5
    } else {
        code
    }
}
