use super::request::RequestError;

use snafu::Snafu;
use tokio::time::Duration;

/// Errors which abort a drain before any Pod is processed. Failures affecting individual Pods are recorded in
/// the `DrainReport` instead.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DrainError {
    #[snafu(display("Invalid drain request: '{}'", source))]
    InvalidRequest { source: RequestError },

    #[snafu(display("Unable to cordon Node '{}': '{}'", node_name, source))]
    Cordon {
        source: kube::Error,
        node_name: String,
    },

    #[snafu(display("Unable to uncordon Node '{}': '{}'", node_name, source))]
    Uncordon {
        source: kube::Error,
        node_name: String,
    },

    #[snafu(display("Unable to list Pods on Node '{}': '{}'", node_name, source))]
    ListPods {
        source: kube::Error,
        node_name: String,
    },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EvictionError {
    #[snafu(display(
        "Drain deadline reached before Pod '{}/{}' could be evicted",
        namespace,
        name
    ))]
    /// The drain deadline passed (or the drain was cancelled) before an eviction was accepted.
    DeadlineExceeded { namespace: String, name: String },

    #[snafu(display(
        "Drain deadline reached while waiting for Pod '{}/{}' to be deleted",
        namespace,
        name
    ))]
    /// The eviction was accepted, but the Pod was still present when the drain deadline passed.
    WaitForDeletion { namespace: String, name: String },

    #[snafu(display("Unable to create eviction for Pod '{}/{}': '{}'", namespace, name, source))]
    /// The API server rejected the eviction with an error which will not be retried.
    Fatal {
        source: kube::Error,
        namespace: String,
        name: String,
    },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ForceDeleteError {
    #[snafu(display("Unable to delete Pod '{}/{}': '{}'", namespace, name, source))]
    Delete {
        source: kube::Error,
        namespace: String,
        name: String,
    },

    #[snafu(display(
        "Deleting Pod '{}/{}' did not complete in the time allocated ({:.2}s)",
        namespace,
        name,
        max_wait.as_secs_f64()
    ))]
    DeleteTimedOut {
        namespace: String,
        name: String,
        max_wait: Duration,
    },
}
