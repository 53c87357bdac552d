//! Apply and remove kompose object graphs against a live cluster

pub mod client;
pub mod deploy;
pub mod undeploy;

pub use client::{ClusterClient, DeleteMode, KubeClusterClient, LiveObject};
pub use deploy::{deploy, inspect_hint, DeploySummary};
pub use undeploy::undeploy;
