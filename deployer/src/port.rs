use mlg_common::models::BuildPack;

/// Port the container is expected to listen on absent an override baked into the image
/// itself. `static` always serves behind Caddy on 8080; a railpack build with a publish
/// directory also goes through the static-file server on 8080; everything else keeps the
/// declared port, defaulting to 3000.
pub fn effective_app_port(build_pack: BuildPack, declared: Option<u16>, publish_directory: Option<&str>) -> u16 {
    let mut port = declared.unwrap_or(3000);

    match build_pack.canonical() {
        BuildPack::Static => port = 8080,
        BuildPack::Railpack => {
            if publish_directory.is_some_and(|d| !d.trim().is_empty()) {
                port = 8080;
            }
        }
        _ => {}
    }

    port
}

/// Parses the last `EXPOSE` directive out of a Dockerfile. In multi-stage builds the
/// final stage's `EXPOSE` is the one that matters, so later directives win.
pub fn extract_port_from_dockerfile(contents: &str) -> Option<u16> {
    let mut last = None;
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.len() >= 6 && trimmed[..6].eq_ignore_ascii_case("expose") {
            if let Some(port_token) = trimmed.split_whitespace().nth(1) {
                let port_str = port_token.split('/').next().unwrap_or(port_token);
                if let Ok(port) = port_str.parse::<u16>() {
                    last = Some(port);
                }
            }
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_build_pack_always_uses_8080() {
        assert_eq!(effective_app_port(BuildPack::Static, Some(5000), None), 8080);
    }

    #[test]
    fn railpack_with_publish_dir_uses_8080() {
        assert_eq!(effective_app_port(BuildPack::Railpack, None, Some("dist")), 8080);
    }

    #[test]
    fn railpack_without_publish_dir_keeps_declared_port() {
        assert_eq!(effective_app_port(BuildPack::Railpack, Some(4000), None), 4000);
    }

    #[test]
    fn nixpacks_is_canonicalized_to_railpack_for_port_rules() {
        assert_eq!(effective_app_port(BuildPack::Nixpacks, None, Some("out")), 8080);
    }

    #[test]
    fn missing_declared_port_defaults_to_3000() {
        assert_eq!(effective_app_port(BuildPack::Dockerfile, None, None), 3000);
    }

    #[test]
    fn extracts_last_expose_directive() {
        let dockerfile = "FROM a AS build\nEXPOSE 3000\nFROM b\nEXPOSE 8080/tcp\n";
        assert_eq!(extract_port_from_dockerfile(dockerfile), Some(8080));
    }

    #[test]
    fn ignores_non_numeric_expose_and_returns_none_when_absent() {
        assert_eq!(extract_port_from_dockerfile("FROM a\nEXPOSE $PORT\n"), None);
        assert_eq!(extract_port_from_dockerfile("FROM a\nRUN echo hi\n"), None);
    }
}
