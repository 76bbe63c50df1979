//! Prometheus text exposition (format 0.0.4).
//!
//! Renders a [`Snapshot`] into `# HELP` / `# TYPE` headers followed by one line
//! per series. Counters gain a `_total` suffix, histograms emit cumulative
//! `_bucket` lines (including `+Inf`) plus `_sum` and `_count`. A `target_info`
//! gauge carries the resource attributes whenever anything else is emitted.

use std::fmt::Write;

use crate::labels::LabelSet;
use crate::registry::{HistogramPoint, InstrumentKind, MetricData, Points, Snapshot};
use crate::resource::Resource;

/// Gauge carrying the resource attributes.
pub const TARGET_INFO: &str = "target_info";

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Body returned when no series exist, so an empty scrape is never confused
/// with a transport failure.
pub const NO_METRICS_PLACEHOLDER: &str = "# no registered metrics";

/// Serialize a snapshot. Returns an empty string when there are no series.
pub fn serialize(snapshot: &Snapshot) -> String {
    if snapshot.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    render_target_info(&snapshot.resource, &mut out);
    for metric in &snapshot.metrics {
        render_metric(metric, &mut out);
    }
    out
}

/// [`serialize`], falling back to [`NO_METRICS_PLACEHOLDER`].
pub fn serialize_or_placeholder(snapshot: &Snapshot) -> String {
    let body = serialize(snapshot);
    if body.is_empty() {
        format!("{NO_METRICS_PLACEHOLDER}\n")
    } else {
        body
    }
}

fn render_target_info(resource: &Resource, out: &mut String) {
    let labels = LabelSet::from_pairs(
        resource
            .attributes()
            .into_iter()
            .map(|(k, v)| (sanitize_label_name(k), v.to_string())),
    );
    let _ = writeln!(out, "# HELP {TARGET_INFO} Target metadata");
    let _ = writeln!(out, "# TYPE {TARGET_INFO} gauge");
    let _ = writeln!(out, "{TARGET_INFO}{} 1", label_block(&labels, None));
}

fn render_metric(metric: &MetricData, out: &mut String) {
    let d = &metric.descriptor;
    let name = exported_name(&d.name, d.kind);

    if !d.description.is_empty() {
        let _ = writeln!(out, "# HELP {} {}", name, escape_help(&d.description));
    }
    let _ = writeln!(out, "# TYPE {} {}", name, d.kind.as_str());

    match &metric.points {
        Points::Counter(points) => {
            for (labels, v) in points {
                let _ = writeln!(out, "{}{} {}", name, label_block(labels, None), v);
            }
        }
        Points::Gauge(points) => {
            for (labels, v) in points {
                let _ = writeln!(out, "{}{} {}", name, label_block(labels, None), format_value(*v));
            }
        }
        Points::Histogram(points) => {
            for (labels, p) in points {
                render_histogram(&name, labels, p, out);
            }
        }
    }
}

fn render_histogram(name: &str, labels: &LabelSet, p: &HistogramPoint, out: &mut String) {
    let cumulative = p.cumulative();
    for (le, count) in p.boundaries.iter().zip(cumulative.iter()) {
        let le = format_value(*le);
        let _ = writeln!(out, "{}_bucket{} {}", name, label_block(labels, Some(&le)), count);
    }
    let _ = writeln!(out, "{}_bucket{} {}", name, label_block(labels, Some("+Inf")), p.count);
    let _ = writeln!(out, "{}_sum{} {}", name, label_block(labels, None), format_value(p.sum));
    let _ = writeln!(out, "{}_count{} {}", name, label_block(labels, None), p.count);
}

/// `{k="v",...}` or the empty string; `le` goes last when given.
fn label_block(labels: &LabelSet, le: Option<&str>) -> String {
    let mut parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", sanitize_label_name(k), escape_label(v)))
        .collect();
    if let Some(le) = le {
        parts.push(format!("le=\"{le}\""));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", parts.join(","))
    }
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{v}")
    }
}

/// Name an instrument is exposed under: sanitized, plus `_total` for counters.
pub fn exported_name(name: &str, kind: InstrumentKind) -> String {
    let mut out = sanitize_metric_name(name);
    if matches!(kind, InstrumentKind::Counter) && !out.ends_with("_total") {
        out.push_str("_total");
    }
    out
}

/// Metric names: `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn sanitize_metric_name(name: &str) -> String {
    sanitize(name, true)
}

/// Label names: `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn sanitize_label_name(name: &str) -> String {
    sanitize(name, false)
}

fn sanitize(name: &str, allow_colon: bool) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || (allow_colon && c == ':') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_invalid_chars() {
        assert_eq!(sanitize_metric_name("http.request.duration"), "http_request_duration");
        assert_eq!(sanitize_label_name("service.name"), "service_name");
        assert_eq!(sanitize_label_name("a:b"), "a_b");
        assert_eq!(sanitize_metric_name("9lives"), "_9lives");
    }

    #[test]
    fn values_render_like_prometheus() {
        assert_eq!(format_value(250.0), "250");
        assert_eq!(format_value(0.5), "0.5");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NAN), "NaN");
    }

    #[test]
    fn label_values_are_escaped() {
        let l = LabelSet::from(&[("route", "/a\"b\\c\nd")][..]);
        assert_eq!(label_block(&l, None), r#"{route="/a\"b\\c\nd"}"#);
    }
}
