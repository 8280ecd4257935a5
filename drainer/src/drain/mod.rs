//! Provides an implementation for draining Pods from a Kubernetes Node, similar to `kubectl drain`.
//!
//! A drain cordons the Node, lists the Pods bound to it and processes each of them in listing order:
//! Pods are classified (see [`classify`]), evicted through the Eviction API so that PodDisruptionBudgets are
//! respected, and optionally deleted outright when eviction fails and the request is forced.
//!
//! All evictions share one deadline, started when the drain begins. Later Pods therefore get whatever time the
//! earlier Pods left over. Fallback deletions may run after the deadline, but only within one shared overrun of
//! [`DELETION_CHECK_INTERVAL`], so a drain returns no later than its timeout plus that interval. Once setup
//! (cordoning and listing) has succeeded, the drain always runs to completion and reports per-Pod outcomes instead
//! of failing.
mod classify;
mod deadline;
pub mod error;
mod eviction;
mod report;
pub mod request;

pub use self::classify::{classify, PodDisposition, SkipReason};
pub use self::deadline::Deadline;
pub use self::error::{DrainError, EvictionError, ForceDeleteError};
pub use self::eviction::{evict_pod, Backoff, DELETION_CHECK_INTERVAL};
pub use self::report::{DrainReport, PodAction, PodOutcome};
pub use self::request::DrainRequest;

use crate::cluster::{pod_key, ClusterClient};

use k8s_openapi::api::core::v1::Pod;
use snafu::{ensure, OptionExt, ResultExt};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{event, instrument, Level};

/// The module-wide result type.
pub type Result<T> = std::result::Result<T, DrainError>;

/// Marks the given node as unschedulable, preventing Pods from being deployed onto it.
#[instrument(skip(client), err)]
pub async fn cordon_node<C: ClusterClient>(client: &C, node_name: &str) -> Result<()> {
    client
        .patch_node_schedulable(node_name, true)
        .await
        .context(error::CordonSnafu { node_name })
}

/// Marks the given node as schedulable, allowing Pods to be deployed onto it.
#[instrument(skip(client), err)]
pub async fn uncordon_node<C: ClusterClient>(client: &C, node_name: &str) -> Result<()> {
    client
        .patch_node_schedulable(node_name, false)
        .await
        .context(error::UncordonSnafu { node_name })
}

/// Cordons a node and removes the Pods running on it.
///
/// An error is returned only if the request is invalid, or the node could not be cordoned, or its Pods could
/// not be listed. In every other case the returned report describes what happened to each Pod, including
/// failures.
pub async fn drain_node<C: ClusterClient>(
    client: &C,
    request: &DrainRequest,
) -> Result<DrainReport> {
    drain_node_with_cancellation(client, request, CancellationToken::new()).await
}

/// Like [`drain_node`], but cancelling `cancellation` expires the drain deadline immediately. Pods which have
/// not yet been evicted are reported as failures (or force deleted, if the request is forced).
#[instrument(skip(client, cancellation), err)]
pub async fn drain_node_with_cancellation<C: ClusterClient>(
    client: &C,
    request: &DrainRequest,
    cancellation: CancellationToken,
) -> Result<DrainReport> {
    request.validate().context(error::InvalidRequestSnafu)?;

    let deadline = Deadline::after(request.timeout, DELETION_CHECK_INTERVAL, cancellation);

    cordon_node(client, &request.node_name).await?;

    let pods = client
        .list_pods_on_node(&request.node_name)
        .await
        .context(error::ListPodsSnafu {
            node_name: &request.node_name,
        })?;
    event!(
        Level::INFO,
        "Found {} Pods on Node '{}'",
        pods.len(),
        request.node_name
    );

    let mut results = Vec::with_capacity(pods.len());
    for pod in pods.iter() {
        if let Some(outcome) = drain_pod(client, pod, request, &deadline).await {
            results.push(outcome);
        }
    }

    let report = DrainReport::new(request, results);
    event!(
        Level::INFO,
        "Finished draining Node '{}': {} Pods processed, {} remaining",
        request.node_name,
        report.results().len(),
        report.remaining_pods().count()
    );

    Ok(report)
}

/// Classifies a single Pod and carries out the resulting action. Returns `None` for Pods which are left out of
/// the report.
async fn drain_pod<C: ClusterClient>(
    client: &C,
    pod: &Pod,
    request: &DrainRequest,
    deadline: &Deadline,
) -> Option<PodOutcome> {
    let (namespace, name) = pod_key(pod);

    match classify(pod, request) {
        PodDisposition::Ignore => {
            event!(
                Level::DEBUG,
                "Not draining Pod '{}/{}': Pod has completed",
                namespace,
                name
            );
            None
        }
        PodDisposition::Skip(reason) => {
            event!(
                Level::INFO,
                "Not draining Pod '{}/{}': {:?}",
                namespace,
                name,
                reason
            );
            Some(PodOutcome::new(namespace, name, reason.action()))
        }
        PodDisposition::Evict => Some(remove_pod(client, pod, request, deadline).await),
    }
}

async fn remove_pod<C: ClusterClient>(
    client: &C,
    pod: &Pod,
    request: &DrainRequest,
    deadline: &Deadline,
) -> PodOutcome {
    let (namespace, name) = pod_key(pod);
    let backoff = Backoff::new(request.retry_backoff, request.max_backoff);

    let eviction_error =
        match evict_pod(client, pod, request.grace_period_seconds, deadline, backoff).await {
            Ok(()) => return PodOutcome::new(namespace, name, PodAction::Evicted),
            Err(err) => err,
        };

    if !request.force {
        return PodOutcome::failed(
            namespace,
            name,
            PodAction::EvictFailed,
            eviction_error.to_string(),
        );
    }

    event!(
        Level::WARN,
        "Eviction of Pod '{}/{}' failed: '{}'. Deleting the Pod instead.",
        namespace,
        name,
        eviction_error
    );
    match force_delete(
        client,
        &namespace,
        &name,
        request.grace_period_seconds,
        deadline,
    )
    .await
    {
        Ok(()) => PodOutcome::new(namespace, name, PodAction::ForceDeleted),
        Err(delete_error) => PodOutcome::failed(
            namespace,
            name,
            PodAction::EvictAndDeleteFailed,
            format!("evict: {}; delete: {}", eviction_error, delete_error),
        ),
    }
}

/// Deletes a Pod without going through the Eviction API. The request is bounded by whatever is left of the
/// deadline's overrun window, and is not made at all once that window has closed.
#[instrument(skip(client, deadline), err)]
async fn force_delete<C: ClusterClient>(
    client: &C,
    namespace: &str,
    name: &str,
    grace_period_seconds: Option<u32>,
    deadline: &Deadline,
) -> std::result::Result<(), ForceDeleteError> {
    let max_wait = deadline.overrun_remaining();
    ensure!(
        !max_wait.is_zero(),
        error::DeleteTimedOutSnafu {
            namespace,
            name,
            max_wait,
        }
    );

    timeout(
        max_wait,
        client.delete_pod(namespace, name, grace_period_seconds),
    )
    .await
    .ok()
    .context(error::DeleteTimedOutSnafu {
        namespace,
        name,
        max_wait,
    })?
    .context(error::DeleteSnafu { namespace, name })
}
