use std::sync::OnceLock;

use regex::Regex;

fn non_alphanum_dash() -> &'static Regex {
    static INSTANCE: OnceLock<Regex> = OnceLock::new();
    INSTANCE.get_or_init(|| Regex::new(r"[^a-z0-9-]").unwrap())
}

/// DNS-1123 sanitization: the single authoritative transform for every user-supplied
/// string that flows into Kubernetes (namespace and service name segments). Unlike
/// [`crate::project_name::ProjectName`], which *rejects* invalid names, this *transforms*
/// arbitrary strings into valid ones.
///
/// Steps: lowercase ASCII, `_` -> `-`, strip everything outside `[a-z0-9-]`, trim leading
/// and trailing `-`, truncate to 63 chars, re-trim trailing `-`.
pub fn sanitize_dns(s: &str) -> String {
    let s = s.to_lowercase().replace('_', "-");
    let s = non_alphanum_dash().replace_all(&s, "").into_owned();
    let s = s.trim_matches('-').to_string();
    if s.len() > 63 {
        s[..63].trim_end_matches('-').to_string()
    } else {
        s
    }
}

/// `dp-<sanitize(user-handle)>-<sanitize(project-ref)>`.
pub fn namespace_name(user_handle: &str, project_ref: &str) -> String {
    format!(
        "dp-{}-{}",
        sanitize_dns(user_handle),
        sanitize_dns(project_ref)
    )
}

/// `sanitize(app-name)`.
pub fn service_name(app_name: &str) -> String {
    sanitize_dns(app_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_replaces_underscores() {
        assert_eq!(sanitize_dns("My_Cool_App"), "my-cool-app");
    }

    #[test]
    fn strips_invalid_characters() {
        assert_eq!(sanitize_dns("a.b@c!d"), "abcd");
    }

    #[test]
    fn trims_leading_and_trailing_dashes() {
        assert_eq!(sanitize_dns("--hello--"), "hello");
    }

    #[test]
    fn truncates_to_63_and_retrims() {
        let long = "a".repeat(62) + "-bbbb";
        let out = sanitize_dns(&long);
        assert!(out.len() <= 63);
        assert!(!out.ends_with('-'));
    }

    #[test]
    fn namespace_and_service_names() {
        assert_eq!(namespace_name("Some User", "my project"), "dp-some-user-my-project");
        assert_eq!(service_name("Hello_World"), "hello-world");
    }

    #[test]
    fn sanitized_output_matches_dns1123_label_grammar() {
        let re = regex::Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap();
        for input in ["UPPER_case!!", "___", "a", "valid-name", "Trailing_"] {
            let out = sanitize_dns(input);
            if !out.is_empty() {
                assert!(re.is_match(&out), "'{out}' from '{input}' should match DNS-1123 label grammar");
            }
            assert!(out.len() <= 63);
        }
    }
}
