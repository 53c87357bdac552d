//! Conversion stories
//!
//! - `kubernetes`: Stories about converting compose applications for plain
//!   Kubernetes, from a single web service to stateful apps with storage
//!
//! - `openshift`: Stories about OpenShift conversions, including in-cluster
//!   builds sourced from the git checkout holding the compose file

mod helpers;
mod kubernetes;
mod openshift;
