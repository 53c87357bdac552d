//! Capabilities the transformers call out to
//!
//! Image builds and git discovery touch the outside world; the transformers
//! only see these traits so they can be tested without docker or a checkout.

use std::path::Path;

use async_trait::async_trait;
use kompose_common::{Result, ServiceConfig};

#[cfg(test)]
use mockall::automock;

/// Builds and publishes service images.
///
/// Used when the run builds images locally before converting.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Build the image of a service
    ///
    /// # Arguments
    ///
    /// * `name` - Service name
    /// * `service` - Service definition; its image names the build output
    /// * `compose_dir` - Directory relative build contexts resolve against
    async fn build(&self, name: &str, service: &ServiceConfig, compose_dir: &Path) -> Result<()>;

    /// Push the built image of a service to its registry
    async fn push(&self, name: &str, service: &ServiceConfig) -> Result<()>;
}

/// Git metadata of the checkout holding the build contexts
#[cfg_attr(test, automock)]
pub trait GitInfo: Send + Sync {
    /// Whether git metadata can be read at all
    fn is_available(&self) -> bool;

    /// Fetch URL of the repository containing `dir`
    fn remote_url(&self, dir: &Path) -> Result<String>;

    /// Branch checked out in the repository containing `dir`
    fn branch(&self, dir: &Path) -> Result<String>;

    /// Path of `dir` relative to its repository root, with a trailing slash
    /// (empty at the root)
    fn prefix(&self, dir: &Path) -> Result<String>;
}
