//! Container and image-build details.

use std::path::PathBuf;

use conductor_core::ResourceName;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::ValueSource;

/// When the launcher pulls the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImagePullPolicy {
    /// Runtime default.
    #[default]
    Default,
    /// Pull on every start.
    Always,
    /// Pull only if the image is not present.
    Missing,
}

/// A named volume mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Volume name; anonymous when absent.
    pub name: Option<String>,
    /// Mount point inside the container.
    pub target: String,
    /// Mounted read-only.
    pub read_only: bool,
}

/// A host path mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindMount {
    /// Host path.
    pub source: PathBuf,
    /// Mount point inside the container.
    pub target: String,
    /// Mounted read-only.
    pub read_only: bool,
}

/// How to run a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Image name, without tag or registry.
    pub image: String,
    /// Image tag; runtime default when absent.
    pub tag: Option<String>,
    /// Registry host.
    pub registry: Option<String>,
    /// Overridden entrypoint.
    pub entrypoint: Option<String>,
    /// Fixed container name.
    pub container_name: Option<String>,
    /// Extra arguments for the container runtime.
    pub runtime_args: Vec<String>,
    /// Pull policy.
    pub pull_policy: ImagePullPolicy,
    /// Volumes keyed by mount target.
    pub volumes: IndexMap<String, Volume>,
    /// Bind mounts keyed by mount target.
    pub bind_mounts: IndexMap<String, BindMount>,
}

impl ContainerSpec {
    /// A container running `image`. A `name:tag` image is split.
    pub fn new(image: impl Into<String>) -> Self {
        let image = image.into();
        let (image, tag) = match image.rsplit_once(':') {
            Some((name, tag)) if !tag.contains('/') => (name.to_string(), Some(tag.to_string())),
            _ => (image, None),
        };
        Self {
            image,
            tag,
            registry: None,
            entrypoint: None,
            container_name: None,
            runtime_args: Vec::new(),
            pull_policy: ImagePullPolicy::Default,
            volumes: IndexMap::new(),
            bind_mounts: IndexMap::new(),
        }
    }

    /// `registry/image:tag`.
    #[must_use]
    pub fn image_reference(&self) -> String {
        let mut reference = String::new();
        if let Some(registry) = &self.registry {
            reference.push_str(registry);
            reference.push('/');
        }
        reference.push_str(&self.image);
        if let Some(tag) = &self.tag {
            reference.push(':');
            reference.push_str(tag);
        }
        reference
    }
}

/// How to build a container image from source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    /// Build context directory.
    pub context: PathBuf,
    /// Dockerfile path; `Dockerfile` inside the context when absent.
    pub dockerfile: Option<PathBuf>,
    /// Target stage.
    pub stage: Option<String>,
    /// Build arguments keyed by name.
    pub build_args: IndexMap<String, ValueSource>,
    /// Build secrets keyed by id; each names a parameter.
    pub build_secrets: IndexMap<String, ResourceName>,
}

impl BuildSpec {
    /// A build of `context` with its default Dockerfile.
    pub fn new(context: impl Into<PathBuf>) -> Self {
        Self {
            context: context.into(),
            dockerfile: None,
            stage: None,
            build_args: IndexMap::new(),
            build_secrets: IndexMap::new(),
        }
    }

    /// The Dockerfile that will be used.
    #[must_use]
    pub fn dockerfile_path(&self) -> PathBuf {
        self.dockerfile
            .clone()
            .unwrap_or_else(|| self.context.join("Dockerfile"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("redis", "redis", None)]
    #[case("redis:7.2", "redis", Some("7.2"))]
    #[case("localhost:5000/app", "localhost:5000/app", None)]
    fn image_tag_is_split(#[case] raw: &str, #[case] image: &str, #[case] tag: Option<&str>) {
        let spec = ContainerSpec::new(raw);
        assert_eq!(spec.image, image);
        assert_eq!(spec.tag.as_deref(), tag);
    }

    #[test]
    fn image_reference_includes_registry_and_tag() {
        let mut spec = ContainerSpec::new("postgres:16");
        spec.registry = Some("docker.io/library".into());
        assert_eq!(spec.image_reference(), "docker.io/library/postgres:16");
    }

    #[test]
    fn default_dockerfile_lives_in_context() {
        let build = BuildSpec::new("./web");
        assert_eq!(build.dockerfile_path(), PathBuf::from("./web/Dockerfile"));
    }
}
