//! The cluster capabilities used by the drain orchestrator.
mod client;

pub use self::client::*;

use crate::constants::DEFAULT_NAMESPACE;

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;

/// Returns the `(namespace, name)` pair identifying a Pod. Pods without a namespace are treated as living in
/// the default namespace.
pub fn pod_key(pod: &Pod) -> (String, String) {
    (
        pod.namespace()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        pod.name_any(),
    )
}
