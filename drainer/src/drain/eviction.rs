//! Evicts a single Pod, retrying while the cluster asks us to back off.
//!
//! A 429 (TOO_MANY_REQUESTS) response to an eviction means that evicting the Pod now would violate a
//! PodDisruptionBudget. This is expected while other replicas are being rescheduled, so such refusals are retried
//! with exponential backoff until the drain deadline. Conflicts and timeouts are treated the same way. Any other
//! error ends the eviction.
use super::deadline::Deadline;
use super::error::{self, EvictionError};
use crate::cluster::{pod_key, ClusterClient};

use http::StatusCode;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use snafu::{ensure, OptionExt, ResultExt};
use tokio::time::Duration;
use tracing::{event, instrument, Level};

// After an eviction is accepted, we poll for the Pod to be deleted at this interval.
pub const DELETION_CHECK_INTERVAL: Duration = Duration::from_millis(500);

// Substituted when a backoff setting is zero.
const FALLBACK_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const FALLBACK_MAX_BACKOFF: Duration = Duration::from_secs(10);

pub type Result<T> = std::result::Result<T, EvictionError>;

/// Exponential backoff which doubles after every delay and never exceeds its ceiling.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = if initial.is_zero() {
            FALLBACK_INITIAL_BACKOFF
        } else {
            initial
        };
        let max = if max.is_zero() {
            FALLBACK_MAX_BACKOFF
        } else {
            max
        };

        Backoff {
            current: initial.min(max),
            max,
        }
    }

    /// Returns the delay to wait before the next attempt and advances the backoff.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}

/// How an error response to an eviction should be handled.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ResponseClass {
    /// The Pod no longer exists.
    NotFound,
    /// A PodDisruptionBudget does not currently allow the eviction.
    Congested,
    /// Conflicts and timeouts, which are likely to succeed if retried.
    Transient,
    Fatal,
}

impl ResponseClass {
    fn of(err: &kube::Error) -> Self {
        let response = match err {
            kube::Error::Api(response) => response,
            _ => return Self::Fatal,
        };

        match StatusCode::from_u16(response.code) {
            Ok(StatusCode::NOT_FOUND) => Self::NotFound,
            Ok(StatusCode::TOO_MANY_REQUESTS) => Self::Congested,
            Ok(StatusCode::CONFLICT) | Ok(StatusCode::GATEWAY_TIMEOUT) => Self::Transient,
            // Fall back to the status reason, which the API server sets even when the code is more generic
            // (a server-side timeout is reported as a 500).
            _ => match response.reason.as_str() {
                "NotFound" => Self::NotFound,
                "TooManyRequests" => Self::Congested,
                "Conflict" | "Timeout" | "ServerTimeout" => Self::Transient,
                _ => Self::Fatal,
            },
        }
    }
}

/// Evicts a Pod and waits for it to be deleted.
///
/// The deadline is checked before every attempt, so an expired deadline never results in another request, and
/// a request still outstanding when the deadline expires is abandoned. A Pod which is already gone counts as
/// evicted.
#[instrument(skip(client, pod, deadline, backoff), fields(pod = %pod.name_any()), err)]
pub async fn evict_pod<C: ClusterClient>(
    client: &C,
    pod: &Pod,
    grace_period_seconds: Option<u32>,
    deadline: &Deadline,
    mut backoff: Backoff,
) -> Result<()> {
    let (namespace, name) = pod_key(pod);

    loop {
        ensure!(
            !deadline.is_expired(),
            error::DeadlineExceededSnafu {
                namespace: &namespace,
                name: &name,
            }
        );

        event!(Level::INFO, "Attempting to evict Pod '{}/{}'", namespace, name);
        let response = deadline
            .run(client.evict_pod(&namespace, &name, grace_period_seconds))
            .await
            .context(error::DeadlineExceededSnafu {
                namespace: &namespace,
                name: &name,
            })?;
        let err = match response {
            Ok(()) => {
                event!(
                    Level::INFO,
                    "Eviction accepted for Pod '{}/{}'",
                    namespace,
                    name
                );
                return wait_for_deletion(client, pod, deadline).await;
            }
            Err(err) => err,
        };

        match ResponseClass::of(&err) {
            ResponseClass::NotFound => {
                event!(
                    Level::INFO,
                    "Pod '{}/{}' no longer exists, nothing to evict",
                    namespace,
                    name
                );
                return Ok(());
            }
            ResponseClass::Congested => {
                let delay = backoff.next_delay();
                event!(
                    Level::WARN,
                    "Too many requests when evicting Pod '{}/{}': '{}'. This is likely due to respecting a Pod Disruption Budget. Retrying in {:.2}s.",
                    namespace,
                    name,
                    err,
                    delay.as_secs_f64()
                );
                deadline.sleep(delay).await;
            }
            ResponseClass::Transient => {
                let delay = backoff.next_delay();
                event!(
                    Level::WARN,
                    "Transient error when evicting Pod '{}/{}': '{}'. Retrying in {:.2}s.",
                    namespace,
                    name,
                    err,
                    delay.as_secs_f64()
                );
                deadline.sleep(delay).await;
            }
            ResponseClass::Fatal => {
                return Err(err).context(error::FatalSnafu { namespace, name });
            }
        }
    }
}

/// Waits for an evicted Pod to be deleted. A Pod with the same name but a different UID is a replacement, so the
/// original counts as deleted.
#[instrument(skip(client, pod, deadline), fields(pod = %pod.name_any()), err)]
async fn wait_for_deletion<C: ClusterClient>(
    client: &C,
    pod: &Pod,
    deadline: &Deadline,
) -> Result<()> {
    let (namespace, name) = pod_key(pod);

    loop {
        let response = deadline
            .run(client.get_pod(&namespace, &name))
            .await
            .context(error::WaitForDeletionSnafu {
                namespace: &namespace,
                name: &name,
            })?;
        match response {
            Ok(None) => {
                event!(Level::INFO, "Pod '{}/{}' deleted.", namespace, name);
                return Ok(());
            }
            Ok(Some(current)) if is_replacement(pod, &current) => {
                event!(
                    Level::INFO,
                    "Pod '{}/{}' deleted and replaced by a new Pod with the same name.",
                    namespace,
                    name
                );
                return Ok(());
            }
            Ok(Some(_)) => {
                event!(
                    Level::DEBUG,
                    "Pod '{}/{}' not yet deleted. Waiting {}s.",
                    namespace,
                    name,
                    DELETION_CHECK_INTERVAL.as_secs_f64()
                );
            }
            Err(err) => {
                event!(
                    Level::ERROR,
                    "Could not determine if Pod '{}/{}' has been deleted: '{}'. Waiting {}s.",
                    namespace,
                    name,
                    err,
                    DELETION_CHECK_INTERVAL.as_secs_f64()
                );
            }
        }

        deadline.sleep(DELETION_CHECK_INTERVAL).await;
        ensure!(
            !deadline.is_expired(),
            error::WaitForDeletionSnafu {
                namespace: &namespace,
                name: &name,
            }
        );
    }
}

fn is_replacement(original: &Pod, current: &Pod) -> bool {
    match (original.uid(), current.uid()) {
        (Some(original_uid), Some(current_uid)) => original_uid != current_uid,
        _ => false,
    }
}
