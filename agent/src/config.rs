//! Reads the agent's configuration from its environment.
use crate::error::{self, Result};
use drainer::drain::request::{
    bool_arg, ARG_DELETE_LOCAL_DATA, ARG_FORCE, ARG_GRACE_PERIOD, ARG_IGNORE_DAEMONSETS,
    ARG_MAX_BACKOFF_MS, ARG_NODE_NAME, ARG_RETRY_BACKOFF_MS, ARG_TIMEOUT_SECONDS,
};
use drainer::drain::DrainRequest;

use serde_json::{Map, Value};
use snafu::ResultExt;
use std::env;

const UNCORDON_ARG: &str = "uncordon";

// Environment variables, and the drain arguments they provide.
const ENV_ARGS: &[(&str, &str)] = &[
    ("MY_NODE_NAME", ARG_NODE_NAME),
    ("DRAIN_IGNORE_DAEMONSETS", ARG_IGNORE_DAEMONSETS),
    ("DRAIN_DELETE_LOCAL_DATA", ARG_DELETE_LOCAL_DATA),
    ("DRAIN_FORCE", ARG_FORCE),
    ("DRAIN_GRACE_PERIOD", ARG_GRACE_PERIOD),
    ("DRAIN_TIMEOUT_SECONDS", ARG_TIMEOUT_SECONDS),
    ("DRAIN_RETRY_BACKOFF_MS", ARG_RETRY_BACKOFF_MS),
    ("DRAIN_MAX_BACKOFF_MS", ARG_MAX_BACKOFF_MS),
    ("DRAIN_UNCORDON", UNCORDON_ARG),
];

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AgentConfig {
    pub request: DrainRequest,
    /// Make the node schedulable again instead of draining it.
    pub uncordon: bool,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let args: Map<String, Value> = ENV_ARGS
            .iter()
            .filter_map(|(env_var, arg)| {
                lookup(env_var).map(|value| (arg.to_string(), Value::String(value)))
            })
            .collect();

        Ok(AgentConfig {
            request: DrainRequest::from_args(&args).context(error::ConfigurationSnafu)?,
            uncordon: bool_arg(&args, UNCORDON_ARG, false),
        })
    }
}
