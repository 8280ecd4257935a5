use super::request::DrainRequest;
use crate::constants::DRAIN_STATUS_ATTEMPTED;

use serde::{Deserialize, Serialize};
use tokio::time::Duration;

/// The outcome of draining a single Pod.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PodAction {
    SkippedMirror,
    SkippedDaemonset,
    SkippedLocalData,
    Evicted,
    ForceDeleted,
    EvictFailed,
    EvictAndDeleteFailed,
}

impl PodAction {
    /// Whether the Pod is still on the node after the drain, without the request having asked for it to stay.
    /// Mirror and DaemonSet Pods are expected to remain and are not counted.
    pub fn pod_remains(&self) -> bool {
        match self {
            Self::SkippedLocalData | Self::EvictFailed | Self::EvictAndDeleteFailed => true,
            Self::SkippedMirror | Self::SkippedDaemonset | Self::Evicted | Self::ForceDeleted => {
                false
            }
        }
    }
}

/// A record of what happened to one Pod during a drain.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PodOutcome {
    namespace: String,
    name: String,
    action: PodAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl PodOutcome {
    pub fn new<S: Into<String>>(namespace: S, name: S, action: PodAction) -> Self {
        PodOutcome {
            namespace: namespace.into(),
            name: name.into(),
            action,
            error: None,
        }
    }

    pub fn failed<S: Into<String>, E: Into<String>>(
        namespace: S,
        name: S,
        action: PodAction,
        error: E,
    ) -> Self {
        PodOutcome {
            error: Some(error.into()),
            ..Self::new(namespace, name, action)
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> PodAction {
        self.action
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// The result of a drain which ran to completion.
///
/// A `DrainReport` only says that every Pod was processed. Whether the node is actually empty must be read from
/// the individual outcomes, see [`DrainReport::remaining_pods`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DrainReport {
    node: String,
    status: String,
    ignore_daemonsets: bool,
    delete_local_data: bool,
    force: bool,
    grace_period: Option<u32>,
    timeout_seconds: u64,
    retry_backoff_ms: u64,
    max_backoff_ms: u64,
    results: Vec<PodOutcome>,
}

impl DrainReport {
    pub fn new(request: &DrainRequest, results: Vec<PodOutcome>) -> Self {
        DrainReport {
            node: request.node_name.clone(),
            status: DRAIN_STATUS_ATTEMPTED.to_string(),
            ignore_daemonsets: request.ignore_daemonsets,
            delete_local_data: request.delete_local_data,
            force: request.force,
            grace_period: request.grace_period_seconds,
            timeout_seconds: request.timeout.as_secs(),
            retry_backoff_ms: millis(request.retry_backoff),
            max_backoff_ms: millis(request.max_backoff),
            results,
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Per-Pod outcomes, in the order the Pods were listed.
    pub fn results(&self) -> &[PodOutcome] {
        &self.results
    }

    /// Outcomes for Pods which are still on the node and were not meant to stay there.
    pub fn remaining_pods(&self) -> impl Iterator<Item = &PodOutcome> {
        self.results
            .iter()
            .filter(|outcome| outcome.action.pod_remains())
    }

    pub fn is_drained(&self) -> bool {
        self.remaining_pods().next().is_none()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_json() {
        let request = DrainRequest {
            ignore_daemonsets: true,
            grace_period_seconds: Some(30),
            timeout: Duration::from_secs(120),
            ..DrainRequest::new("n1")
        };
        let report = DrainReport::new(
            &request,
            vec![
                PodOutcome::new("kube-system", "fluentd-x7k2p", PodAction::SkippedDaemonset),
                PodOutcome::new("default", "web-5d8f", PodAction::Evicted),
                PodOutcome::failed(
                    "default",
                    "db-0",
                    PodAction::EvictFailed,
                    "Drain deadline reached",
                ),
            ],
        );

        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "node": "n1",
                "status": "drain_attempted",
                "ignore_daemonsets": true,
                "delete_local_data": false,
                "force": false,
                "grace_period": 30,
                "timeout_seconds": 120,
                "retry_backoff_ms": 1000,
                "max_backoff_ms": 10000,
                "results": [
                    {"namespace": "kube-system", "name": "fluentd-x7k2p", "action": "skipped_daemonset"},
                    {"namespace": "default", "name": "web-5d8f", "action": "evicted"},
                    {"namespace": "default", "name": "db-0", "action": "evict_failed", "error": "Drain deadline reached"},
                ],
            })
        );
    }

    #[test]
    fn test_unset_grace_period_is_null() {
        let report = DrainReport::new(&DrainRequest::new("n1"), vec![]);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["grace_period"], json!(null));
        assert_eq!(value["results"], json!([]));
    }

    #[test]
    fn test_action_names() {
        let test_cases = vec![
            (PodAction::SkippedMirror, "skipped_mirror"),
            (PodAction::SkippedDaemonset, "skipped_daemonset"),
            (PodAction::SkippedLocalData, "skipped_local_data"),
            (PodAction::Evicted, "evicted"),
            (PodAction::ForceDeleted, "force_deleted"),
            (PodAction::EvictFailed, "evict_failed"),
            (PodAction::EvictAndDeleteFailed, "evict_and_delete_failed"),
        ];
        for (action, name) in test_cases {
            assert_eq!(serde_json::to_value(action).unwrap(), json!(name));
        }
    }

    #[test]
    fn test_remaining_pods() {
        let request = DrainRequest::new("n1");
        let drained = DrainReport::new(
            &request,
            vec![
                PodOutcome::new("default", "a", PodAction::Evicted),
                PodOutcome::new("default", "b", PodAction::ForceDeleted),
                PodOutcome::new("kube-system", "c", PodAction::SkippedMirror),
                PodOutcome::new("kube-system", "d", PodAction::SkippedDaemonset),
            ],
        );
        assert!(drained.is_drained());

        let partial = DrainReport::new(
            &request,
            vec![
                PodOutcome::new("default", "a", PodAction::Evicted),
                PodOutcome::new("default", "cache", PodAction::SkippedLocalData),
                PodOutcome::failed("default", "db-0", PodAction::EvictFailed, "boom"),
            ],
        );
        assert!(!partial.is_drained());
        let remaining: Vec<&str> = partial.remaining_pods().map(PodOutcome::name).collect();
        assert_eq!(remaining, vec!["cache", "db-0"]);
    }
}
