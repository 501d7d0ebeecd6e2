use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    #[error("invalid repository name: {0}")]
    InvalidName(String),
    #[error("invalid reference: {0}")]
    InvalidReference(String),
}

pub type Result<T> = std::result::Result<T, DistributionError>;

fn name_re() -> &'static Regex {
    static INSTANCE: OnceLock<Regex> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        Regex::new(r"^[a-z0-9]+([._-][a-z0-9]+)*(/[a-z0-9]+([._-][a-z0-9]+)*)*$")
            .expect("to create a regex from pattern")
    })
}

fn reference_re() -> &'static Regex {
    static INSTANCE: OnceLock<Regex> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9_][a-zA-Z0-9._-]{0,127}$").expect("to create a regex from pattern")
    })
}

/// Namespace of the repository, per the OCI distribution spec's `<name>` grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name(String);

impl std::ops::Deref for Name {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Name {
    pub fn new(name: &str) -> Result<Self> {
        if name_re().is_match(name) {
            Ok(Name(name.to_string()))
        } else {
            Err(DistributionError::InvalidName(name.to_string()))
        }
    }
}

/// A tag (this control plane never references images by digest), per the OCI
/// distribution spec's `<reference>` grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference(pub String);

impl std::ops::Deref for Reference {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Reference {
    pub fn new(name: &str) -> Result<Self> {
        if reference_re().is_match(name) {
            Ok(Reference(name.to_string()))
        } else {
            Err(DistributionError::InvalidReference(name.to_string()))
        }
    }
}

/// A fully parsed `<registry>/<name>:<tag>` image reference. Parsing rejects an
/// un-tagged reference before the workflow ever probes the registry with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub registry: String,
    pub name: Name,
    pub tag: Reference,
}

impl ImageRef {
    pub fn parse(image_ref: &str) -> Result<Self> {
        let (registry, rest) = image_ref
            .split_once('/')
            .ok_or_else(|| DistributionError::InvalidName(image_ref.to_string()))?;

        let (name, tag) = rest
            .rsplit_once(':')
            .ok_or_else(|| DistributionError::InvalidReference(image_ref.to_string()))?;

        Ok(Self {
            registry: registry.to_string(),
            name: Name::new(name)?,
            tag: Reference::new(tag)?,
        })
    }

    pub fn manifest_path(&self) -> String {
        format!("/v2/{}/manifests/{}", self.name, self.tag)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.name, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_accepts_valid_and_rejects_invalid() {
        assert!(Name::new("dp-acme-default/hello").is_ok());
        assert!(Name::new("_invalid").is_err());
        assert!(Name::new("/invalid").is_err());
    }

    #[test]
    fn reference_rejects_digest_style() {
        assert!(Reference::new("latest").is_ok());
        assert!(Reference::new("my_tag@2").is_err());
    }

    #[test]
    fn image_ref_parses_registry_name_and_tag() {
        let parsed = ImageRef::parse("registry.internal:5000/dp-acme-default/hello:abc1234").unwrap();
        assert_eq!(parsed.registry, "registry.internal:5000");
        assert_eq!(&*parsed.name, "dp-acme-default/hello");
        assert_eq!(&*parsed.tag, "abc1234");
    }

    #[test]
    fn image_ref_rejects_untagged_reference() {
        assert!(ImageRef::parse("registry.internal/dp-acme-default/hello").is_err());
    }
}
