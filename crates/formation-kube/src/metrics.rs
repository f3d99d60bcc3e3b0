//! Condition transition metrics

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;

/// Name of the transition counter
pub const TRANSITIONS_TOTAL: &str = "formation_location_descriptor_transitions_total";

/// Records a descriptor condition turning `True`
pub trait TransitionRecorder: Send + Sync {
    fn record(&self, namespace: &str, name: &str, condition_type: &str, reason: &str);
}

/// Prometheus-backed recorder
#[derive(Clone)]
pub struct PrometheusTransitionRecorder {
    transitions: IntCounterVec,
}

impl PrometheusTransitionRecorder {
    /// Create the counter and register it with `registry`
    pub fn new(registry: &Registry) -> Result<Self> {
        let transitions = IntCounterVec::new(
            Opts::new(
                TRANSITIONS_TOTAL,
                "Location descriptor condition transitions into True",
            ),
            &["namespace", "name", "type", "reason"],
        )?;
        registry.register(Box::new(transitions.clone()))?;
        Ok(Self { transitions })
    }

    /// Current value for one label set
    pub fn count(&self, namespace: &str, name: &str, condition_type: &str, reason: &str) -> u64 {
        self.transitions
            .with_label_values(&[namespace, name, condition_type, reason])
            .get()
    }
}

impl TransitionRecorder for PrometheusTransitionRecorder {
    fn record(&self, namespace: &str, name: &str, condition_type: &str, reason: &str) {
        self.transitions
            .with_label_values(&[namespace, name, condition_type, reason])
            .inc();
    }
}

/// Registry contents in the Prometheus text format
pub fn export_metrics(registry: &Registry) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> Response {
    match export_metrics(&registry) {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Router serving `GET /metrics` for scraping
pub fn metrics_router(registry: Arc<Registry>) -> axum::Router {
    axum::Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(registry)
}

/// Recorder that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl TransitionRecorder for NoopRecorder {
    fn record(&self, _namespace: &str, _name: &str, _condition_type: &str, _reason: &str) {}
}

/// A recorded transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub namespace: String,
    pub name: String,
    pub condition_type: String,
    pub reason: String,
}

/// Recorder that keeps every transition in memory, for tests
#[derive(Debug, Default)]
pub struct CapturingRecorder {
    transitions: Mutex<Vec<Transition>>,
}

impl CapturingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl TransitionRecorder for CapturingRecorder {
    fn record(&self, namespace: &str, name: &str, condition_type: &str, reason: &str) {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Transition {
                namespace: namespace.to_string(),
                name: name.to_string(),
                condition_type: condition_type.to_string(),
                reason: reason.to_string(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prometheus_recorder_counts() {
        let registry = Registry::new();
        let recorder = PrometheusTransitionRecorder::new(&registry).unwrap();

        recorder.record("team", "svc", "Error", "TerminalError");
        recorder.record("team", "svc", "Error", "TerminalError");
        recorder.record("team", "svc", "Ready", "");

        assert_eq!(recorder.count("team", "svc", "Error", "TerminalError"), 2);
        assert_eq!(recorder.count("team", "svc", "Ready", ""), 1);

        let families = registry.gather();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].get_name(), TRANSITIONS_TOTAL);
    }

    #[test]
    fn test_export_metrics() {
        let registry = Registry::new();
        let recorder = PrometheusTransitionRecorder::new(&registry).unwrap();
        recorder.record("team", "svc", "Ready", "Provisioned");

        let text = export_metrics(&registry).unwrap();
        assert!(text.contains(TRANSITIONS_TOTAL));
        assert!(text.contains(r#"reason="Provisioned""#));
    }

    #[tokio::test]
    async fn test_metrics_handler_serves_registry() {
        let registry = Arc::new(Registry::new());
        let recorder = PrometheusTransitionRecorder::new(&registry).unwrap();
        recorder.record("team", "svc", "Error", "TerminalError");

        let response = metrics_handler(State(registry)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(r#"type="Error""#));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        let _first = PrometheusTransitionRecorder::new(&registry).unwrap();
        assert!(PrometheusTransitionRecorder::new(&registry).is_err());
    }

    #[test]
    fn test_capturing_recorder() {
        let recorder = CapturingRecorder::new();
        recorder.record("ns", "a", "Ready", "Done");

        let transitions = recorder.transitions();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].condition_type, "Ready");

        recorder.clear();
        assert!(recorder.transitions().is_empty());
    }
}
