//! Service model to Kubernetes / OpenShift object translation
//!
//! A [`Transformer`] walks a [`KomposeObject`] in service-name order and
//! produces the ordered object graph that `convert` renders and `up`/`down`
//! apply. Object builders are shared; the OpenShift transformer layers its
//! own kinds on top of the Kubernetes one.

pub mod builders;
pub mod collaborators;
pub mod k8s;
pub mod kubernetes;
pub mod object;
pub mod openshift;
pub mod ordering;
pub mod unsupported;

use async_trait::async_trait;
use kompose_common::{ConvertOptions, KomposeObject, Provider, Result};

pub use collaborators::{GitInfo, ImageBuilder};
pub use kubernetes::KubernetesTransformer;
pub use object::{KubeObject, ObjectKind};
pub use openshift::{build_args_env, get_image_tag, OpenShiftTransformer};
pub use ordering::sort_exposure_first;
pub use unsupported::WarnedKeys;

/// Converts a whole service model into an ordered object graph
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Convert every service.
    ///
    /// Unsupported fields are reported once per entry in `warned`. Any error
    /// aborts the run; no partial graph is returned.
    async fn transform(
        &self,
        model: &KomposeObject,
        warned: &mut WarnedKeys,
    ) -> Result<Vec<KubeObject>>;
}

/// External capabilities a conversion may need
#[derive(Clone, Copy, Default)]
pub struct Collaborators<'a> {
    /// Local docker build and push
    pub image_builder: Option<&'a dyn ImageBuilder>,
    /// Git metadata for BuildConfigs
    pub git: Option<&'a dyn GitInfo>,
}

/// Convert `model` for the provider selected in `opt`
pub async fn transform(
    model: &KomposeObject,
    opt: &ConvertOptions,
    collaborators: Collaborators<'_>,
    warned: &mut WarnedKeys,
) -> Result<Vec<KubeObject>> {
    match opt.provider {
        Provider::Kubernetes => {
            let mut transformer = KubernetesTransformer::new(opt);
            if let Some(builder) = collaborators.image_builder {
                transformer = transformer.with_image_builder(builder);
            }
            transformer.transform(model, warned).await
        }
        Provider::OpenShift => {
            let mut transformer = OpenShiftTransformer::new(opt);
            if let Some(builder) = collaborators.image_builder {
                transformer = transformer.with_image_builder(builder);
            }
            if let Some(git) = collaborators.git {
                transformer = transformer.with_git(git);
            }
            transformer.transform(model, warned).await
        }
    }
}
