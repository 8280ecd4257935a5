//! The configuration for a single drain.
use crate::constants::{DEFAULT_DRAIN_TIMEOUT, DEFAULT_MAX_BACKOFF, DEFAULT_RETRY_BACKOFF};

use serde_json::{Map, Value};
use snafu::{ensure, Snafu};
use tokio::time::Duration;

// Argument keys accepted by `DrainRequest::from_args`.
pub const ARG_NODE_NAME: &str = "node_name";
pub const ARG_IGNORE_DAEMONSETS: &str = "ignore_daemonsets";
pub const ARG_DELETE_LOCAL_DATA: &str = "delete_local_data";
pub const ARG_FORCE: &str = "force";
pub const ARG_GRACE_PERIOD: &str = "grace_period";
pub const ARG_TIMEOUT_SECONDS: &str = "timeout_seconds";
pub const ARG_RETRY_BACKOFF_MS: &str = "retry_backoff_ms";
pub const ARG_MAX_BACKOFF_MS: &str = "max_backoff_ms";

pub type Result<T> = std::result::Result<T, RequestError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RequestError {
    #[snafu(display("'{}' is required", ARG_NODE_NAME))]
    MissingNodeName,
}

/// Describes how a node should be drained. A `DrainRequest` is not modified once a drain has started.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DrainRequest {
    /// The node to cordon and drain.
    pub node_name: String,
    /// Leave Pods owned by a DaemonSet on the node.
    pub ignore_daemonsets: bool,
    /// Evict Pods using node-local storage (emptyDir, hostPath), losing that data.
    pub delete_local_data: bool,
    /// Delete Pods directly when eviction fails. This also allows evicting Pods with node-local storage.
    pub force: bool,
    /// Grace period given to evicted or deleted Pods. `None` uses each Pod's own setting.
    pub grace_period_seconds: Option<u32>,
    /// Upper bound on the time spent evicting Pods, shared by every Pod on the node.
    pub timeout: Duration,
    /// The first delay between eviction attempts which the cluster refused.
    pub retry_backoff: Duration,
    /// The ceiling for the delay between eviction attempts.
    pub max_backoff: Duration,
}

impl DrainRequest {
    /// Creates a request to drain `node_name` with default settings.
    pub fn new<S: Into<String>>(node_name: S) -> Self {
        DrainRequest {
            node_name: node_name.into(),
            ignore_daemonsets: false,
            delete_local_data: false,
            force: false,
            grace_period_seconds: None,
            timeout: DEFAULT_DRAIN_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }

    /// Builds a request from loosely-typed arguments, such as those supplied in a tool call.
    ///
    /// Every argument except `node_name` is optional. Booleans may be given as JSON booleans, numbers or the
    /// strings `"true"`, `"false"`, `"1"` and `"0"`; integers may be JSON numbers or numeric strings. Values
    /// which cannot be interpreted fall back to their defaults. A negative `grace_period` means "use the Pod's
    /// own grace period".
    pub fn from_args(args: &Map<String, Value>) -> Result<Self> {
        let node_name = args
            .get(ARG_NODE_NAME)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let mut request = DrainRequest::new(node_name);
        request.validate()?;

        request.ignore_daemonsets = bool_arg(args, ARG_IGNORE_DAEMONSETS, false);
        request.delete_local_data = bool_arg(args, ARG_DELETE_LOCAL_DATA, false);
        request.force = bool_arg(args, ARG_FORCE, false);
        request.grace_period_seconds = int_arg(args, ARG_GRACE_PERIOD).and_then(grace_period);

        if let Some(seconds) = int_arg(args, ARG_TIMEOUT_SECONDS) {
            request.timeout = Duration::from_secs(non_negative(seconds));
        }
        if let Some(millis) = int_arg(args, ARG_RETRY_BACKOFF_MS) {
            request.retry_backoff = Duration::from_millis(non_negative(millis));
        }
        if let Some(millis) = int_arg(args, ARG_MAX_BACKOFF_MS) {
            request.max_backoff = Duration::from_millis(non_negative(millis));
        }

        Ok(request)
    }

    /// Checks that the request names a node.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.node_name.trim().is_empty(), MissingNodeNameSnafu);
        Ok(())
    }
}

/// Converts a grace period in seconds into the form used by `DrainRequest`. Negative values mean "use the Pod's
/// default"; values too large for the API are clamped.
pub fn grace_period(seconds: i64) -> Option<u32> {
    if seconds < 0 {
        None
    } else {
        Some(u32::try_from(seconds).unwrap_or(u32::MAX))
    }
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Reads a boolean argument, returning `default` if it is absent or cannot be interpreted.
pub fn bool_arg(args: &Map<String, Value>, key: &str, default: bool) -> bool {
    match args.get(key) {
        Some(Value::Bool(value)) => *value,
        Some(Value::String(value)) => match value.as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => default,
        },
        Some(Value::Number(value)) => value.as_f64().map(|n| n != 0.0).unwrap_or(default),
        _ => default,
    }
}

/// Reads an integer argument. Fractional numbers are truncated.
pub fn int_arg(args: &Map<String, Value>, key: &str) -> Option<i64> {
    match args.get(key)? {
        Value::Number(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|n| n.trunc() as i64)),
        Value::String(value) => value.trim().parse().ok(),
        _ => None,
    }
}
