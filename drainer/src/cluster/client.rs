use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, DeleteParams, EvictParams, ListParams, Patch, PatchParams};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

#[cfg(any(feature = "mockall", test))]
use mockall::mock;

/// The result type returned by cluster operations. Errors keep the API server's status code and reason so that
/// callers can decide whether a failed request is worth retrying.
pub type Result<T> = std::result::Result<T, kube::Error>;

#[async_trait]
/// A trait providing the cluster operations needed to cordon and drain a node. This is provided as a trait
/// in order to allow mocks to be used for testing purposes.
pub trait ClusterClient: Send + Sync {
    /// Sets the node's `spec.unschedulable` flag.
    async fn patch_node_schedulable(&self, node_name: &str, unschedulable: bool) -> Result<()>;
    /// Lists every Pod bound to the given node, across all namespaces.
    async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<Pod>>;
    /// Creates an Eviction for the given Pod. Evictions are subject to PodDisruptionBudgets.
    async fn evict_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: Option<u32>,
    ) -> Result<()>;
    /// Fetches a Pod, returning `None` if it does not exist.
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>>;
    /// Deletes a Pod directly, bypassing PodDisruptionBudgets.
    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: Option<u32>,
    ) -> Result<()>;
}

#[cfg(any(feature = "mockall", test))]
mock! {
    /// A Mock ClusterClient for use in tests.
    pub ClusterClient {}
    #[async_trait]
    impl ClusterClient for ClusterClient {
        async fn patch_node_schedulable(&self, node_name: &str, unschedulable: bool) -> Result<()>;
        async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<Pod>>;
        async fn evict_pod(
            &self,
            namespace: &str,
            name: &str,
            grace_period_seconds: Option<u32>,
        ) -> Result<()>;
        async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>>;
        async fn delete_pod(
            &self,
            namespace: &str,
            name: &str,
            grace_period_seconds: Option<u32>,
        ) -> Result<()>;
    }
}

#[async_trait]
impl<T> ClusterClient for Arc<T>
where
    T: ClusterClient,
{
    async fn patch_node_schedulable(&self, node_name: &str, unschedulable: bool) -> Result<()> {
        (**self)
            .patch_node_schedulable(node_name, unschedulable)
            .await
    }

    async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<Pod>> {
        (**self).list_pods_on_node(node_name).await
    }

    async fn evict_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: Option<u32>,
    ) -> Result<()> {
        (**self)
            .evict_pod(namespace, name, grace_period_seconds)
            .await
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        (**self).get_pod(namespace, name).await
    }

    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: Option<u32>,
    ) -> Result<()> {
        (**self)
            .delete_pod(namespace, name, grace_period_seconds)
            .await
    }
}

#[derive(Clone)]
/// Concrete implementation of the `ClusterClient` trait backed by the Kubernetes API. This implementation will
/// almost certainly be used in any case that isn't a unit test.
pub struct K8SClusterClient {
    k8s_client: kube::client::Client,
}

impl K8SClusterClient {
    pub fn new(k8s_client: kube::client::Client) -> Self {
        K8SClusterClient { k8s_client }
    }

    fn namespaced_pod_api(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.k8s_client.clone(), namespace)
    }
}

/// Builds the delete options for an eviction or deletion. `None` leaves the Pod's own grace period in effect.
fn delete_params(grace_period_seconds: Option<u32>) -> DeleteParams {
    DeleteParams {
        grace_period_seconds,
        ..DeleteParams::default()
    }
}

#[async_trait]
impl ClusterClient for K8SClusterClient {
    #[instrument(skip(self), err)]
    async fn patch_node_schedulable(&self, node_name: &str, unschedulable: bool) -> Result<()> {
        let patch = json!({
            "spec": {
                "unschedulable": unschedulable
            }
        });

        let nodes: Api<Node> = Api::all(self.k8s_client.clone());
        nodes
            .patch(node_name, &PatchParams::default(), &Patch::Strategic(&patch))
            .await?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<Pod>> {
        let pods: Api<Pod> = Api::all(self.k8s_client.clone());
        let node_pods = pods
            .list(&ListParams::default().fields(&format!("spec.nodeName={}", node_name)))
            .await?;

        Ok(node_pods.items)
    }

    #[instrument(skip(self), err)]
    async fn evict_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: Option<u32>,
    ) -> Result<()> {
        let evict_params = EvictParams {
            delete_options: grace_period_seconds.map(|seconds| delete_params(Some(seconds))),
            ..EvictParams::default()
        };

        self.namespaced_pod_api(namespace)
            .evict(name, &evict_params)
            .await?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        self.namespaced_pod_api(namespace).get_opt(name).await
    }

    #[instrument(skip(self), err)]
    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: Option<u32>,
    ) -> Result<()> {
        self.namespaced_pod_api(namespace)
            .delete(name, &delete_params(grace_period_seconds))
            .await?;

        Ok(())
    }
}
