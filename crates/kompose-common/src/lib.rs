//! Common types for kompose: the service model, run options, errors, and
//! Kubernetes helpers shared by the transform and deploy crates.

#![deny(missing_docs)]

pub mod error;
pub mod kube_utils;
pub mod model;
pub mod options;

use std::time::Duration;

pub use error::{Error, ResultExt};
pub use model::{
    BuildArg, EnvVar, Expose, KomposeObject, LoadedFrom, PortMapping, Protocol, RestartPolicy,
    ServiceConfig, VolumeMode, VolumeMount,
};
pub use options::{BuildMode, ControllerKind, ControllerToggles, ConvertOptions, Provider};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Label key identifying the service an object was generated for.
///
/// Every generated object carries exactly this one label; undeploy relies on
/// exact label-set equality to find what a conversion produced.
pub const LABEL_SERVICE: &str = "io.kompose.service";

/// Compose label that requests public exposure of a service
pub const EXPOSE_LABEL: &str = "kompose.service.expose";

/// Storage requested by every generated PersistentVolumeClaim
pub const PVC_REQUEST_SIZE: &str = "100Mi";

/// How long a reaping delete waits for the object to disappear
pub const REAP_TIMEOUT: Duration = Duration::from_secs(300);
