use mlg_common::models::{BuildConfig, BuildPack};
use sha2::{Digest, Sha256};

/// Derives the deterministic, content-addressed build tag described in `SPEC_FULL.md`
/// §4.3: folds the commit SHA with the build configuration so that an unchanged
/// `(sha, pack, config)` always resolves to the same tag, and any changed input changes
/// the tag — while preserving a legacy escape hatch for cache compatibility.
pub fn derive_tag(short_sha: &str, build_pack: BuildPack, config: &BuildConfig) -> String {
    let canonical_pack = build_pack.canonical();

    if canonical_pack == BuildPack::Railpack && config.is_empty() {
        return short_sha.to_string();
    }

    let canonical = format!(
        "{}\0{}\0{}\0{}\0{}\0{}",
        canonical_pack,
        config.root_directory.as_deref().unwrap_or(""),
        config.dockerfile_path.as_deref().unwrap_or(""),
        config.publish_directory.as_deref().unwrap_or(""),
        config.build_command.as_deref().unwrap_or(""),
        config.start_command.as_deref().unwrap_or(""),
    );
    let digest = Sha256::digest(canonical.as_bytes());
    let suffix = hex::encode(&digest[..4]);

    format!("{short_sha}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config() -> BuildConfig {
        BuildConfig::default()
    }

    #[test]
    fn legacy_railpack_empty_config_is_just_the_sha() {
        assert_eq!(derive_tag("abcd123", BuildPack::Railpack, &empty_config()), "abcd123");
        assert_eq!(derive_tag("abcd123", BuildPack::Nixpacks, &empty_config()), "abcd123");
    }

    #[test]
    fn determinism() {
        let cfg = BuildConfig {
            root_directory: Some("app".into()),
            ..Default::default()
        };
        let a = derive_tag("abcd123", BuildPack::Dockerfile, &cfg);
        let b = derive_tag("abcd123", BuildPack::Dockerfile, &cfg);
        assert_eq!(a, b);
        assert_ne!(a, "abcd123");
    }

    #[test]
    fn configuration_sensitivity() {
        let base = BuildConfig {
            root_directory: Some("app".into()),
            ..Default::default()
        };
        let changed = BuildConfig {
            dockerfile_path: Some("Dockerfile.prod".into()),
            ..base.clone()
        };

        let tag_a = derive_tag("abcd123", BuildPack::Dockerfile, &base);
        let tag_b = derive_tag("abcd123", BuildPack::Dockerfile, &changed);
        assert_ne!(tag_a, tag_b);
    }

    #[test]
    fn non_empty_config_is_never_bare_sha() {
        let cfg = BuildConfig {
            start_command: Some("npm start".into()),
            ..Default::default()
        };
        let tag = derive_tag("abcd123", BuildPack::Static, &cfg);
        assert_ne!(tag, "abcd123");
        assert!(tag.starts_with("abcd123-"));
    }
}
