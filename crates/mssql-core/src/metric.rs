use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
};

use prometheus::{GaugeVec, Opts, TextEncoder, core::Collector};
use serde::Serialize;

use crate::error::CoreError;

/// Immutable metadata of one exported series family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: String,
    pub label_names: Vec<String>,
}

impl MetricDescriptor {
    /// `name{label,label}` or just `name` when unlabeled.
    pub fn signature(&self) -> String {
        if self.label_names.is_empty() {
            self.name.clone()
        } else {
            format!("{}{{{}}}", self.name, self.label_names.join(","))
        }
    }
}

/// Gauge handle bound to a [`MetricDescriptor`].
///
/// Cloning is cheap and every clone writes to the same series. Unlabeled
/// gauges are zero-label vectors, so nothing is exposed until the first `set`.
#[derive(Clone)]
pub struct MetricGauge {
    desc: Arc<MetricDescriptor>,
    vec: GaugeVec,
    observed: Arc<Mutex<BTreeSet<Vec<String>>>>,
}

impl MetricGauge {
    pub fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Self, CoreError> {
        let vec = GaugeVec::new(Opts::new(name, help), label_names)
            .map_err(|e| CoreError::InvalidMetric(format!("{name}: {e}")))?;

        let desc = MetricDescriptor {
            name: name.to_string(),
            help: help.to_string(),
            label_names: label_names.iter().map(|s| s.to_string()).collect(),
        };
        Ok(Self {
            desc: Arc::new(desc),
            vec,
            observed: Arc::new(Mutex::new(BTreeSet::new())),
        })
    }

    #[inline]
    pub fn descriptor(&self) -> &MetricDescriptor {
        &self.desc
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.desc.name
    }

    /// Store `value` as the current reading for `label_values`.
    pub fn set(&self, label_values: &[&str], value: f64) -> Result<(), CoreError> {
        self.check_arity(label_values)?;

        self.vec.get_metric_with_label_values(label_values)?.set(value);
        self.observed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(label_values.iter().map(|s| s.to_string()).collect());
        Ok(())
    }

    /// Current reading of an already observed label combination.
    pub fn value(&self, label_values: &[&str]) -> Option<f64> {
        if label_values.len() != self.desc.label_names.len() {
            return None;
        }
        let key: Vec<String> = label_values.iter().map(|s| s.to_string()).collect();
        let seen = self
            .observed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&key);
        if !seen {
            return None;
        }
        self.vec
            .get_metric_with_label_values(label_values)
            .ok()
            .map(|g| g.get())
    }

    /// Label combinations set at least once, in sorted order.
    pub fn observed(&self) -> Vec<Vec<String>> {
        self.observed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Text exposition of this family alone.
    pub fn render(&self) -> Result<String, CoreError> {
        // the encoder rejects families without samples
        if self.observed.lock().unwrap_or_else(|e| e.into_inner()).is_empty() {
            return Ok(String::new());
        }
        let families = self.vec.collect();
        Ok(TextEncoder::new().encode_to_string(&families)?)
    }

    pub(crate) fn collector(&self) -> Box<dyn Collector> {
        Box::new(self.vec.clone())
    }

    fn check_arity(&self, label_values: &[&str]) -> Result<(), CoreError> {
        let expected = self.desc.label_names.len();
        if label_values.len() != expected {
            return Err(CoreError::LabelArityMismatch {
                metric: self.desc.name.clone(),
                expected,
                got: label_values.len(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for MetricGauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricGauge")
            .field("desc", &self.desc)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_previous_reading() {
        let g = MetricGauge::new("test_gauge", "help", &["database"]).unwrap();
        g.set(&["db1"], 5.0).unwrap();
        g.set(&["db1"], 7.0).unwrap();
        assert_eq!(g.value(&["db1"]), Some(7.0));
        assert_eq!(g.observed(), vec![vec!["db1".to_string()]]);
    }

    #[test]
    fn set_rejects_wrong_arity() {
        let g = MetricGauge::new("test_gauge", "help", &["database", "state"]).unwrap();
        let err = g.set(&["db1"], 1.0).unwrap_err();
        assert!(matches!(
            err,
            CoreError::LabelArityMismatch {
                expected: 2,
                got: 1,
                ..
            }
        ));
        assert!(g.observed().is_empty());
    }

    #[test]
    fn unlabeled_gauge_renders_only_after_set() {
        let g = MetricGauge::new("test_unlabeled", "Some help", &[]).unwrap();
        assert!(g.render().unwrap().is_empty());

        g.set(&[], 1700000000.0).unwrap();
        let text = g.render().unwrap();
        assert!(text.contains("# HELP test_unlabeled Some help"));
        assert!(text.contains("test_unlabeled 1700000000"));
        assert_eq!(g.value(&[]), Some(1700000000.0));
    }

    #[test]
    fn value_does_not_create_series() {
        let g = MetricGauge::new("test_gauge", "help", &["database"]).unwrap();
        assert_eq!(g.value(&["missing"]), None);
        assert!(!g.render().unwrap().contains("missing"));
    }

    #[test]
    fn invalid_name_is_rejected() {
        let err = MetricGauge::new("bad name", "help", &[]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidMetric(_)));
    }

    #[test]
    fn signature_lists_labels() {
        let g = MetricGauge::new("mssql_connections", "h", &["database", "state"]).unwrap();
        assert_eq!(g.descriptor().signature(), "mssql_connections{database,state}");
        let u = MetricGauge::new("up", "h", &[]).unwrap();
        assert_eq!(u.descriptor().signature(), "up");
    }
}
