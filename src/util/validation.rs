//! Option validation helpers
//!
//! Every command validates its options before any request is sent. Failures
//! are returned as `M365Error::Validation` with the message shown to the user.

use crate::error::{M365Error, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref GUID_RE: Option<Regex> =
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").ok();
    static ref TEAMS_CHAT_ID_RE: Option<Regex> = Regex::new(
        r"^19:[0-9a-zA-Z_\-]+@(thread\.v2|thread\.skype|thread\.tacv2|unq\.gbl\.spaces)$"
    )
    .ok();
    static ref UPN_RE: Option<Regex> = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~\-]+@[a-zA-Z0-9\-]+(\.[a-zA-Z0-9\-]+)+$"
    )
    .ok();
    static ref SHAREPOINT_HOST_RE: Option<Regex> =
        Regex::new(r"(?i)^[a-z0-9\-]+\.sharepoint(-df)?\.(com|us|de|cn)$").ok();
}

fn matches(re: &Option<Regex>, value: &str) -> bool {
    re.as_ref().map(|re| re.is_match(value)).unwrap_or(false)
}

pub fn is_valid_guid(value: &str) -> bool {
    matches(&GUID_RE, value)
}

pub fn is_valid_teams_chat_id(value: &str) -> bool {
    matches(&TEAMS_CHAT_ID_RE, value)
}

pub fn is_valid_user_principal_name(value: &str) -> bool {
    matches(&UPN_RE, value)
}

/// `https://<tenant>.sharepoint.com` with an optional site path
pub fn is_valid_sharepoint_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(parsed) => {
            parsed.scheme() == "https"
                && parsed
                    .host_str()
                    .map(|h| matches(&SHAREPOINT_HOST_RE, h))
                    .unwrap_or(false)
        }
        Err(_) => false,
    }
}

/// Accepts dates (`2024-01-31`), date-times with or without offset and
/// fractional seconds (`2024-01-31T10:00:00Z`, `2024-01-31T10:00:00.000+02:00`)
pub fn is_valid_iso_datetime(value: &str) -> bool {
    if chrono::DateTime::parse_from_rfc3339(value).is_ok() {
        return true;
    }
    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];
    if NAIVE_FORMATS
        .iter()
        .any(|f| chrono::NaiveDateTime::parse_from_str(value, f).is_ok())
    {
        return true;
    }
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

pub fn ensure_guid(value: &str, option: &str) -> Result<()> {
    if is_valid_guid(value) {
        Ok(())
    } else {
        Err(M365Error::Validation(format!(
            "{} is not a valid GUID for option {}",
            value, option
        )))
    }
}

pub fn ensure_sharepoint_url(value: &str) -> Result<()> {
    if is_valid_sharepoint_url(value) {
        Ok(())
    } else {
        Err(M365Error::Validation(format!(
            "{} is not a valid SharePoint Online site URL",
            value
        )))
    }
}

pub fn ensure_iso_datetime(value: &str, option: &str) -> Result<()> {
    if is_valid_iso_datetime(value) {
        Ok(())
    } else {
        Err(M365Error::Validation(format!(
            "{} is not a valid ISO date string for option {}",
            value, option
        )))
    }
}

/// Exactly one option of the set must be given
///
/// `options` pairs each option name with whether it was supplied.
pub fn ensure_one_of(options: &[(&str, bool)]) -> Result<()> {
    let names = option_names(options);
    match options.iter().filter(|(_, set)| *set).count() {
        0 => Err(M365Error::Validation(format!(
            "Specify one of the following options: {}.",
            names
        ))),
        1 => Ok(()),
        _ => Err(M365Error::Validation(format!(
            "Specify only one of the following options: {}.",
            names
        ))),
    }
}

/// At most one option of the set may be given
pub fn ensure_at_most_one_of(options: &[(&str, bool)]) -> Result<()> {
    if options.iter().filter(|(_, set)| *set).count() > 1 {
        return Err(M365Error::Validation(format!(
            "Specify only one of the following options: {}.",
            option_names(options)
        )));
    }
    Ok(())
}

fn option_names(options: &[(&str, bool)]) -> String {
    options
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Case-insensitive match against a closed set of values, returning the
/// canonical spelling
pub fn ensure_allowed<'a>(value: &str, allowed: &[&'a str]) -> Result<&'a str> {
    allowed
        .iter()
        .find(|a| a.eq_ignore_ascii_case(value))
        .copied()
        .ok_or_else(|| {
            M365Error::Validation(format!(
                "{} is not a valid value. Allowed values are {}",
                value,
                allowed.join("|")
            ))
        })
}

/// Split a comma separated option value, dropping empty entries
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid() {
        assert!(is_valid_guid("00000000-0000-0000-0000-000000000000"));
        assert!(is_valid_guid("8C2FE5BB-4A69-4E27-8F5E-3F6E2C1D5A9B"));
        assert!(!is_valid_guid("invalid"));
        assert!(!is_valid_guid("{00000000-0000-0000-0000-000000000000}"));
        assert!(!is_valid_guid("00000000-0000-0000-0000-00000000000"));
    }

    #[test]
    fn test_teams_chat_id() {
        assert!(is_valid_teams_chat_id("19:2da4c29f6d7041eca70b638b43d45437@thread.v2"));
        assert!(is_valid_teams_chat_id(
            "19:82fe7758-5bb3-4f0d-a43f-e555fd399c6f_8c0a1a67-50ce-4114-bb6c-da9c5dbcf6ca@unq.gbl.spaces"
        ));
        assert!(!is_valid_teams_chat_id("8b081ef6-4792-4def-b2c9-c363a1bf41d5"));
        assert!(!is_valid_teams_chat_id("19:abc@thread.other"));
    }

    #[test]
    fn test_user_principal_name() {
        assert!(is_valid_user_principal_name("AlexW@contoso.onmicrosoft.com"));
        assert!(is_valid_user_principal_name("john.o'hara@contoso.com"));
        assert!(!is_valid_user_principal_name("AlexW"));
        assert!(!is_valid_user_principal_name("AlexW@contoso"));
    }

    #[test]
    fn test_sharepoint_url() {
        assert!(is_valid_sharepoint_url("https://contoso.sharepoint.com"));
        assert!(is_valid_sharepoint_url("https://contoso.sharepoint.com/sites/project-x"));
        assert!(!is_valid_sharepoint_url("http://contoso.sharepoint.com"));
        assert!(!is_valid_sharepoint_url("https://contoso.example.com"));
        assert!(!is_valid_sharepoint_url("foo"));
    }

    #[test]
    fn test_iso_datetime() {
        assert!(is_valid_iso_datetime("2021-06-20"));
        assert!(is_valid_iso_datetime("2021-06-20T10:00:00Z"));
        assert!(is_valid_iso_datetime("2021-06-20T10:00:00.000+02:00"));
        assert!(is_valid_iso_datetime("2021-06-20T10:00"));
        assert!(!is_valid_iso_datetime("20/06/2021"));
        assert!(!is_valid_iso_datetime("2021-13-01"));
    }

    #[test]
    fn test_ensure_one_of() {
        assert!(ensure_one_of(&[("id", true), ("name", false)]).is_ok());

        let none = ensure_one_of(&[("id", false), ("name", false)]).unwrap_err();
        assert_eq!(none.to_string(), "Specify one of the following options: id, name.");

        let both = ensure_one_of(&[("id", true), ("name", true)]).unwrap_err();
        assert_eq!(both.to_string(), "Specify only one of the following options: id, name.");
    }

    #[test]
    fn test_ensure_at_most_one_of() {
        assert!(ensure_at_most_one_of(&[("a", false), ("b", false)]).is_ok());
        assert!(ensure_at_most_one_of(&[("a", true), ("b", false)]).is_ok());
        assert!(ensure_at_most_one_of(&[("a", true), ("b", true)]).is_err());
    }

    #[test]
    fn test_ensure_allowed_returns_canonical_value() {
        let allowed = ["notStarted", "inProgress", "completed"];
        assert_eq!(ensure_allowed("inprogress", &allowed).unwrap(), "inProgress");

        let err = ensure_allowed("test", &allowed).unwrap_err();
        assert_eq!(
            err.to_string(),
            "test is not a valid value. Allowed values are notStarted|inProgress|completed"
        );
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}
