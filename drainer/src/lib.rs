//! Cordon-and-drain orchestration for Kubernetes nodes.
//!
//! The entrypoint is [`drain::drain_node`], which cordons a node, evicts (or, when forced, deletes) the Pods
//! running on it and returns a per-Pod [`drain::DrainReport`]. Access to the cluster is abstracted behind the
//! [`cluster::ClusterClient`] trait so that callers can supply their own implementation.
pub mod cluster;
pub mod constants;
pub mod drain;
pub mod telemetry;
