use tokio::time::Duration;

// Annotation set by the kubelet on the API-side mirror of a static Pod.
pub const MIRROR_POD_ANNOTATION: &str = "kubernetes.io/config.mirror";
pub const DAEMONSET_KIND: &str = "DaemonSet";

// Pod phases
pub const POD_PHASE_SUCCEEDED: &str = "Succeeded";
pub const POD_PHASE_FAILED: &str = "Failed";

pub const DEFAULT_NAMESPACE: &str = "default";

// The `status` reported for every drain which ran to completion. It says nothing about whether the node is empty.
pub const DRAIN_STATUS_ATTEMPTED: &str = "drain_attempted";

// DrainRequest defaults
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(10000);
