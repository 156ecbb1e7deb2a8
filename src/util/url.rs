//! URL building helpers for Graph filters and SharePoint REST paths

use crate::error::{M365Error, Result};
use url::Url;

/// Escape a value for use inside a single-quoted OData string literal
pub fn escape_odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Escape and percent-encode a value for a `$filter` string literal
pub fn odata_filter_value(value: &str) -> String {
    urlencoding::encode(&escape_odata_literal(value)).into_owned()
}

/// Percent-encode everything except unreserved characters
pub fn encode_component(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Join two URL fragments with exactly one slash between them
pub fn url_combine(base: &str, relative: &str) -> String {
    let base = base.trim_end_matches('/');
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, relative)
    }
}

fn parse(web_url: &str) -> Result<Url> {
    Url::parse(web_url)
        .map_err(|e| M365Error::Validation(format!("{} is not a valid URL: {}", web_url, e)))
}

/// `https://contoso.sharepoint.com/sites/a` -> `https://contoso.sharepoint.com`
pub fn tenant_root(web_url: &str) -> Result<String> {
    let parsed = parse(web_url)?;
    let host = parsed
        .host_str()
        .ok_or_else(|| M365Error::Validation(format!("{} has no host", web_url)))?;
    match parsed.port() {
        Some(port) => Ok(format!("{}://{}:{}", parsed.scheme(), host, port)),
        None => Ok(format!("{}://{}", parsed.scheme(), host)),
    }
}

/// Tenant admin site for a SharePoint URL:
/// `https://contoso.sharepoint.com` -> `https://contoso-admin.sharepoint.com`
pub fn admin_url(spo_url: &str) -> Result<String> {
    let root = tenant_root(spo_url)?;
    if root.contains("-admin.") {
        return Ok(root);
    }
    match root.split_once(".sharepoint.") {
        Some((tenant, domain)) => Ok(format!("{}-admin.sharepoint.{}", tenant, domain)),
        None => Err(M365Error::Validation(format!(
            "{} is not a SharePoint Online URL",
            spo_url
        ))),
    }
}

/// Decoded server-relative path of a web without a trailing slash
/// (`/sites/abc`, or an empty string for the tenant root)
pub fn web_server_relative_path(web_url: &str) -> Result<String> {
    let parsed = parse(web_url)?;
    let path = urlencoding::decode(parsed.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| parsed.path().to_string());
    Ok(path.trim_end_matches('/').to_string())
}

/// Resolve a folder or list URL to a server-relative path.
///
/// Accepts an absolute URL, a server-relative URL that already includes the
/// web path, or a path relative to the web:
/// with web `https://contoso.sharepoint.com/sites/abc`, `Shared Documents`,
/// `/Shared Documents` and `/sites/abc/Shared Documents` all resolve to
/// `/sites/abc/Shared Documents`.
pub fn server_relative_path(web_url: &str, path: &str) -> Result<String> {
    let web_path = web_server_relative_path(web_url)?;
    let root = tenant_root(web_url)?;

    let mut relative = path.trim();
    if let Some(stripped) = strip_prefix_ignore_case(relative, &root) {
        relative = stripped;
    }
    let relative = relative.trim_end_matches('/');

    if !web_path.is_empty() {
        if let Some(rest) = strip_prefix_ignore_case(relative, &web_path) {
            if rest.is_empty() || rest.starts_with('/') {
                return Ok(format!("{}{}", web_path, rest));
            }
        }
    }

    Ok(format!("{}/{}", web_path, relative.trim_start_matches('/')))
}

/// Host names and SharePoint paths compare without regard to ASCII case
fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let len = prefix.len();
    if value.len() >= len
        && value.is_char_boundary(len)
        && value[..len].eq_ignore_ascii_case(prefix)
    {
        Some(&value[len..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_odata_literal() {
        assert_eq!(escape_odata_literal("O'Neil's team"), "O''Neil''s team");
        assert_eq!(odata_filter_value("Tasks List"), "Tasks%20List");
        assert_eq!(odata_filter_value("a'b"), "a%27%27b");
    }

    #[test]
    fn test_url_combine() {
        assert_eq!(url_combine("https://a/", "/b"), "https://a/b");
        assert_eq!(url_combine("https://a", "b/c"), "https://a/b/c");
        assert_eq!(url_combine("https://a/", ""), "https://a");
    }

    #[test]
    fn test_tenant_and_admin_url() {
        assert_eq!(
            tenant_root("https://contoso.sharepoint.com/sites/abc").unwrap(),
            "https://contoso.sharepoint.com"
        );
        assert_eq!(
            admin_url("https://contoso.sharepoint.com").unwrap(),
            "https://contoso-admin.sharepoint.com"
        );
        assert_eq!(
            admin_url("https://contoso-admin.sharepoint.com/").unwrap(),
            "https://contoso-admin.sharepoint.com"
        );
        assert!(admin_url("https://contoso.example.com").is_err());
        assert_eq!(
            tenant_root("http://127.0.0.1:8080/sites/abc").unwrap(),
            "http://127.0.0.1:8080"
        );
    }

    #[test]
    fn test_server_relative_path_variants() {
        let web = "https://contoso.sharepoint.com/sites/abc";
        let expected = "/sites/abc/Shared Documents";
        assert_eq!(server_relative_path(web, "Shared Documents").unwrap(), expected);
        assert_eq!(server_relative_path(web, "/Shared Documents/").unwrap(), expected);
        assert_eq!(server_relative_path(web, "/sites/abc/Shared Documents").unwrap(), expected);
        assert_eq!(
            server_relative_path(web, "https://contoso.sharepoint.com/sites/abc/Shared Documents")
                .unwrap(),
            expected
        );
    }

    #[test]
    fn test_server_relative_path_mixed_case_host() {
        let web = "https://Contoso.sharepoint.com/sites/abc";
        assert_eq!(
            server_relative_path(web, "https://Contoso.sharepoint.com/sites/abc/Shared Documents")
                .unwrap(),
            "/sites/abc/Shared Documents"
        );
        assert_eq!(
            server_relative_path(web, "https://CONTOSO.SharePoint.com/sites/abc").unwrap(),
            "/sites/abc"
        );
    }

    #[test]
    fn test_server_relative_path_mixed_case_web_path() {
        let web = "https://contoso.sharepoint.com/sites/abc";
        assert_eq!(
            server_relative_path(web, "/Sites/ABC/Shared Documents").unwrap(),
            "/sites/abc/Shared Documents"
        );
        assert_eq!(server_relative_path(web, "/SITES/abc").unwrap(), "/sites/abc");
        assert_eq!(
            server_relative_path(web, "/sites/abcdef/Docs").unwrap(),
            "/sites/abc/sites/abcdef/Docs"
        );
    }

    #[test]
    fn test_server_relative_path_root_web() {
        let web = "https://contoso.sharepoint.com";
        assert_eq!(server_relative_path(web, "Shared Documents").unwrap(), "/Shared Documents");
        assert_eq!(web_server_relative_path(web).unwrap(), "");
    }

    #[test]
    fn test_web_path_is_decoded() {
        assert_eq!(
            web_server_relative_path("https://contoso.sharepoint.com/sites/my%20site/").unwrap(),
            "/sites/my site"
        );
    }
}
