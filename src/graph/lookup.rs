//! Name-to-ID resolution shared by the command modules
//!
//! A lookup either yields exactly one ID or fails: no match is `NotFound`,
//! several matches are `Ambiguous` with the candidate IDs in the message.

use super::GraphClient;
use crate::error::{M365Error, Result};
use crate::util::url::odata_filter_value;
use serde::Deserialize;
use tracing::info;

/// Minimal directory object as returned with `$select=id,...`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryObject {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
}

/// Reduce lookup results to the single expected item
pub fn single_match<T>(
    mut items: Vec<T>,
    not_found: impl FnOnce() -> String,
    ambiguous: impl FnOnce(&[T]) -> String,
) -> Result<T> {
    match items.len() {
        0 => Err(M365Error::NotFound(not_found())),
        1 => Ok(items.remove(0)),
        _ => Err(M365Error::Ambiguous(ambiguous(&items))),
    }
}

/// Resolve a Microsoft 365 group's ID from its display name
pub async fn group_id_by_name(client: &GraphClient, name: &str) -> Result<String> {
    info!("Retrieving group id for '{}'", name);
    let groups: Vec<DirectoryObject> = client
        .get_all_pages(&format!(
            "groups?$filter=displayName eq '{}'&$select=id,displayName",
            odata_filter_value(name)
        ))
        .await?;

    let group = single_match(
        groups,
        || format!("The specified group '{}' does not exist.", name),
        |found| {
            format!(
                "Multiple groups with name '{}' found: {}",
                name,
                found.iter().map(|g| g.id.as_str()).collect::<Vec<_>>().join(", ")
            )
        },
    )?;
    Ok(group.id)
}

/// Result of resolving user principal names
#[derive(Debug, Default)]
pub struct UserLookup {
    /// IDs of the users found, in input order
    pub ids: Vec<String>,
    /// Names that matched no user
    pub invalid: Vec<String>,
}

/// Resolve user IDs from user principal names.
///
/// Every name is looked up so unknown names can be reported together.
pub async fn user_ids_by_upn(client: &GraphClient, upns: &[String]) -> Result<UserLookup> {
    let mut lookup = UserLookup::default();

    for upn in upns {
        info!("Retrieving user id for '{}'", upn);
        let users: Vec<DirectoryObject> = client
            .get_all_pages(&format!(
                "users?$filter=userPrincipalName eq '{}'&$select=id,userPrincipalName",
                odata_filter_value(upn)
            ))
            .await?;

        match users.into_iter().next() {
            Some(user) => lookup.ids.push(user.id),
            None => lookup.invalid.push(upn.clone()),
        }
    }

    Ok(lookup)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_match_outcomes() {
        let one = single_match(vec!["a"], || "none".into(), |_| "many".into());
        assert_eq!(one.unwrap(), "a");

        let none = single_match(Vec::<&str>::new(), || "none".into(), |_| "many".into());
        assert!(matches!(none, Err(M365Error::NotFound(m)) if m == "none"));

        let many = single_match(vec!["a", "b"], || "none".into(), |f| f.join(","));
        assert!(matches!(many, Err(M365Error::Ambiguous(m)) if m == "a,b"));
    }
}
