use super::request::DrainRequest;
use super::report::PodAction;
use crate::constants::{
    DAEMONSET_KIND, MIRROR_POD_ANNOTATION, POD_PHASE_FAILED, POD_PHASE_SUCCEEDED,
};

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;

/// What a drain should do with a Pod found on the node.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PodDisposition {
    /// The Pod has already run to completion. It is left out of the drain and its report entirely.
    Ignore,
    /// The Pod stays on the node, and the reason is reported.
    Skip(SkipReason),
    /// The Pod should be evicted.
    Evict,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// Static Pods are managed by the kubelet and cannot be evicted through the API.
    Mirror,
    /// The DaemonSet controller ignores cordons and would reschedule the Pod anyway.
    DaemonSet,
    /// Evicting the Pod would destroy data in node-local volumes.
    LocalData,
}

impl SkipReason {
    pub fn action(&self) -> PodAction {
        match self {
            Self::Mirror => PodAction::SkippedMirror,
            Self::DaemonSet => PodAction::SkippedDaemonset,
            Self::LocalData => PodAction::SkippedLocalData,
        }
    }
}

/// Decides what to do with a Pod. The rules are checked in order and the first match wins:
///
/// 1. Succeeded or Failed Pods are ignored.
/// 2. Mirror Pods are skipped.
/// 3. DaemonSet Pods are skipped if the request ignores DaemonSets.
/// 4. Pods with emptyDir or hostPath volumes are skipped unless the request allows deleting local data, or is
///    forced.
/// 5. Everything else is evicted.
///
/// Local data detection is deliberately conservative: it does not try to work out whether a volume is backed by
/// durable storage.
pub fn classify(pod: &Pod, request: &DrainRequest) -> PodDisposition {
    if is_completed(pod) {
        PodDisposition::Ignore
    } else if is_mirror_pod(pod) {
        PodDisposition::Skip(SkipReason::Mirror)
    } else if request.ignore_daemonsets && is_owned_by(pod, DAEMONSET_KIND) {
        PodDisposition::Skip(SkipReason::DaemonSet)
    } else if has_local_data(pod) && !request.delete_local_data && !request.force {
        PodDisposition::Skip(SkipReason::LocalData)
    } else {
        PodDisposition::Evict
    }
}

fn is_completed(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .map(|phase| phase == POD_PHASE_SUCCEEDED || phase == POD_PHASE_FAILED)
        .unwrap_or(false)
}

fn is_mirror_pod(pod: &Pod) -> bool {
    pod.annotations().contains_key(MIRROR_POD_ANNOTATION)
}

fn is_owned_by(pod: &Pod, kind: &str) -> bool {
    pod.owner_references()
        .iter()
        .any(|reference| reference.kind == kind)
}

fn has_local_data(pod: &Pod) -> bool {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.volumes.as_ref())
        .map(|volumes| {
            volumes
                .iter()
                .any(|volume| volume.empty_dir.is_some() || volume.host_path.is_some())
        })
        .unwrap_or(false)
}
