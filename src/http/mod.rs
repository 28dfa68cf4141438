pub mod client;
pub mod loading;
pub mod pipeline;
pub mod retry;

/// Endpoints that never receive a bearer token and never trigger a
/// refresh-and-retry, to keep the auth flow from recursing into itself.
const AUTH_EXEMPT_PATHS: &[&str] = &["/auth/login", "/auth/register", "/auth/refresh"];

pub(crate) fn is_auth_exempt(url: &str) -> bool {
    let path = url.split('?').next().unwrap_or(url);
    AUTH_EXEMPT_PATHS.iter().any(|p| path.ends_with(p))
}

pub(crate) fn is_refresh_endpoint(url: &str) -> bool {
    let path = url.split('?').next().unwrap_or(url);
    path.ends_with("/auth/refresh")
}

/// Joins a relative path onto the configured base URL and version segment,
/// collapsing duplicate slashes everywhere except the scheme separator.
pub fn join_url(base: &str, version: &str, path: &str) -> String {
    let joined = format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        version.trim_matches('/'),
        path.trim_start_matches('/')
    );
    collapse_slashes(&joined)
}

fn collapse_slashes(url: &str) -> String {
    let (scheme, rest) = match url.find("://") {
        Some(idx) => url.split_at(idx + 3),
        None => ("", url),
    };

    let mut collapsed = String::with_capacity(url.len());
    collapsed.push_str(scheme);
    let mut previous_slash = false;
    for ch in rest.chars() {
        if ch == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        collapsed.push(ch);
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_base_version_and_path() {
        assert_eq!(
            join_url("https://hrm.example.com/api", "v1", "/employees"),
            "https://hrm.example.com/api/v1/employees"
        );
    }

    #[test]
    fn collapses_duplicate_slashes_outside_the_scheme() {
        assert_eq!(
            join_url("https://hrm.example.com/api/", "/v1/", "//employees//42"),
            "https://hrm.example.com/api/v1/employees/42"
        );
    }

    #[test]
    fn auth_endpoints_are_exempt() {
        assert!(is_auth_exempt("https://h.example/api/v1/auth/login"));
        assert!(is_auth_exempt("https://h.example/api/v1/auth/refresh"));
        assert!(is_auth_exempt("https://h.example/api/v1/auth/register"));
        assert!(!is_auth_exempt("https://h.example/api/v1/auth/logout"));
        assert!(!is_auth_exempt("https://h.example/api/v1/employees"));
    }

    #[test]
    fn query_strings_do_not_defeat_the_exemption_check() {
        assert!(is_auth_exempt("https://h.example/api/v1/auth/login?next=1"));
        assert!(!is_auth_exempt(
            "https://h.example/api/v1/employees?q=auth/refresh"
        ));
    }
}
