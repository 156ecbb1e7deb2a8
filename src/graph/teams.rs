//! Microsoft Teams: teams, chats, chat messages and usage reports

use super::GraphClient;
use super::lookup::single_match;
use crate::error::{M365Error, Result};
use crate::util::url::{encode_component, escape_odata_literal, odata_filter_value};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

/// Chat creation sometimes answers 404 while the members are still being
/// provisioned; it is retried this many times
pub const CHAT_CREATE_MAX_RETRIES: u32 = 4;

/// Length of `shortBody` before it is cut and suffixed with `...`
const SHORT_BODY_LENGTH: usize = 50;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMember {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub members: Vec<ChatMember>,
}

impl Chat {
    /// True when the chat has exactly the given members (case-insensitive)
    fn has_exact_members(&self, emails: &[String]) -> bool {
        self.members.len() == emails.len()
            && emails.iter().all(|email| {
                self.members.iter().any(|m| {
                    m.email
                        .as_deref()
                        .map(|e| e.eq_ignore_ascii_case(email))
                        .unwrap_or(false)
                })
            })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamCandidate {
    id: String,
    #[serde(default)]
    resource_provisioning_options: Vec<String>,
}

/// Teams operations on top of the Graph client
pub struct TeamsClient<'a> {
    client: &'a GraphClient,
}

impl<'a> TeamsClient<'a> {
    pub fn new(client: &'a GraphClient) -> Self {
        Self { client }
    }

    // ========================================================================
    // Teams
    // ========================================================================

    pub async fn get_team(&self, team_id: &str) -> Result<Value> {
        self.client
            .get(&format!("teams/{}", encode_component(team_id)))
            .await
    }

    /// Resolve a team from its display name. Only groups provisioned as a
    /// team are considered.
    pub async fn team_id_by_name(&self, name: &str) -> Result<String> {
        info!("Retrieving team id for '{}'", name);
        let groups: Vec<TeamCandidate> = self
            .client
            .get_all_pages(&format!(
                "groups?$filter=displayName eq '{}'&$select=id,resourceProvisioningOptions",
                odata_filter_value(name)
            ))
            .await?;

        let teams: Vec<TeamCandidate> = groups
            .into_iter()
            .filter(|g| g.resource_provisioning_options.iter().any(|o| o == "Team"))
            .collect();

        let team = single_match(
            teams,
            || "The specified team does not exist in the Microsoft Teams".to_string(),
            |found| {
                format!(
                    "Multiple Microsoft Teams teams with name {} found: {}",
                    name,
                    found.iter().map(|t| t.id.as_str()).collect::<Vec<_>>().join(",")
                )
            },
        )?;
        Ok(team.id)
    }

    // ========================================================================
    // Chat messages
    // ========================================================================

    /// All messages of a chat with `body` flattened to its content and a
    /// `shortBody` preview added
    pub async fn list_chat_messages(&self, chat_id: &str) -> Result<Vec<Value>> {
        let messages: Vec<Value> = self
            .client
            .get_all_pages(&format!("chats/{}/messages", chat_id))
            .await?;

        Ok(messages.into_iter().map(flatten_message_body).collect())
    }

    pub async fn send_chat_message(&self, chat_id: &str, message: &str) -> Result<Value> {
        let body = json!({ "body": { "content": message } });
        self.client
            .post(&format!("chats/{}/messages", chat_id), &body)
            .await
    }

    // ========================================================================
    // Chats
    // ========================================================================

    /// Chat whose members are exactly `member_emails`; created when none
    /// exists yet
    pub async fn chat_id_for_members(&self, member_emails: &[String]) -> Result<String> {
        let mut existing = self.find_chats_by_participants(member_emails).await?;

        match existing.len() {
            0 => {
                info!("No existing chat found, creating a new one");
                let chat = self.create_chat(member_emails).await?;
                Ok(chat.id)
            }
            1 => Ok(existing.remove(0).id),
            _ => Err(M365Error::Ambiguous(format!(
                "Multiple chat conversations with this name found. Please disambiguate:\n{}",
                existing
                    .iter()
                    .map(|c| {
                        let topic = c
                            .topic
                            .as_deref()
                            .filter(|t| !t.is_empty())
                            .map(|t| format!(" - {}", t))
                            .unwrap_or_default();
                        format!(
                            "- {}{} - {}",
                            c.id,
                            topic,
                            c.created_date_time.as_deref().unwrap_or_default()
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            ))),
        }
    }

    /// Group chat resolved from its topic
    pub async fn chat_id_by_name(&self, name: &str) -> Result<String> {
        info!("Retrieving chat id for '{}'", name);
        let chats: Vec<Chat> = self
            .client
            .get_all_pages(&format!(
                "chats?$filter=topic eq '{}'&$expand=members&$select=id,topic,createdDateTime,members",
                odata_filter_value(name)
            ))
            .await?;

        let chat = single_match(
            chats,
            || "No chat conversation was found with this name.".to_string(),
            |found| {
                format!(
                    "Multiple chat conversations with this name found. Please disambiguate:\n{}",
                    found
                        .iter()
                        .map(|c| format!(
                            "- {} - {} - {}",
                            c.id,
                            c.created_date_time.as_deref().unwrap_or_default(),
                            c.members
                                .iter()
                                .filter_map(|m| m.email.as_deref())
                                .collect::<Vec<_>>()
                                .join(", ")
                        ))
                        .collect::<Vec<_>>()
                        .join("\n")
                )
            },
        )?;
        Ok(chat.id)
    }

    async fn find_chats_by_participants(&self, member_emails: &[String]) -> Result<Vec<Chat>> {
        let chat_type = chat_type_for(member_emails.len());
        let chats: Vec<Chat> = self
            .client
            .get_all_pages(&format!(
                "chats?$filter=chatType eq '{}'&$expand=members&$select=id,topic,createdDateTime,members",
                escape_odata_literal(chat_type)
            ))
            .await?;

        Ok(chats
            .into_iter()
            .filter(|c| c.has_exact_members(member_emails))
            .collect())
    }

    /// Create a chat, retrying the intermittent 404 Graph returns while
    /// members are not yet resolvable
    pub async fn create_chat(&self, member_emails: &[String]) -> Result<Chat> {
        let body = create_chat_body(member_emails);
        let mut retried = 0;

        loop {
            match self.client.post::<_, Chat>("chats", &body).await {
                Err(e) if e.status() == Some(404) && retried < CHAT_CREATE_MAX_RETRIES => {
                    retried += 1;
                    warn!(
                        "Chat creation returned 404, retrying ({}/{})",
                        retried, CHAT_CREATE_MAX_RETRIES
                    );
                }
                other => return other,
            }
        }
    }

    // ========================================================================
    // Reports
    // ========================================================================

    /// Teams device usage user counts as the CSV Graph returns
    pub async fn device_usage_user_counts(&self, period: &str) -> Result<String> {
        self.client
            .get_text(&format!(
                "reports/getTeamsDeviceUsageUserCounts(period='{}')",
                escape_odata_literal(period)
            ))
            .await
    }
}

fn chat_type_for(member_count: usize) -> &'static str {
    if member_count > 2 { "group" } else { "oneOnOne" }
}

fn create_chat_body(member_emails: &[String]) -> Value {
    let members: Vec<Value> = member_emails
        .iter()
        .map(|email| {
            json!({
                "@odata.type": "#microsoft.graph.aadUserConversationMember",
                "roles": ["owner"],
                "user@odata.bind": format!("https://graph.microsoft.com/v1.0/users/{}", email)
            })
        })
        .collect();

    json!({
        "chatType": chat_type_for(member_emails.len()),
        "members": members
    })
}

/// Replace `body` with its content and add a `shortBody` preview
pub fn flatten_message_body(mut message: Value) -> Value {
    let content = message
        .get("body")
        .and_then(|b| b.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    let short_body = if content.chars().count() > SHORT_BODY_LENGTH {
        format!(
            "{}...",
            content.chars().take(SHORT_BODY_LENGTH).collect::<String>()
        )
    } else {
        content.clone()
    };

    if let Some(obj) = message.as_object_mut() {
        obj.insert("body".into(), Value::String(content));
        obj.insert("shortBody".into(), Value::String(short_body));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_short_message() {
        let msg = flatten_message_body(json!({"id": "1", "body": {"contentType": "text", "content": "Hello"}}));
        assert_eq!(msg["body"], "Hello");
        assert_eq!(msg["shortBody"], "Hello");
    }

    #[test]
    fn test_flatten_long_message_is_truncated() {
        let content = "x".repeat(51);
        let msg = flatten_message_body(json!({"id": "1", "body": {"content": content}}));
        assert_eq!(msg["shortBody"], format!("{}...", "x".repeat(50)));
        assert_eq!(msg["body"].as_str().unwrap().len(), 51);

        let exact = flatten_message_body(json!({"body": {"content": "y".repeat(50)}}));
        assert_eq!(exact["shortBody"], "y".repeat(50));
    }

    #[test]
    fn test_create_chat_body() {
        let two = create_chat_body(&["a@contoso.com".into(), "b@contoso.com".into()]);
        assert_eq!(two["chatType"], "oneOnOne");
        assert_eq!(
            two["members"][1]["user@odata.bind"],
            "https://graph.microsoft.com/v1.0/users/b@contoso.com"
        );
        assert_eq!(two["members"][0]["roles"][0], "owner");

        let three = create_chat_body(&["a@c.com".into(), "b@c.com".into(), "c@c.com".into()]);
        assert_eq!(three["chatType"], "group");
    }

    #[test]
    fn test_exact_members_is_case_insensitive() {
        let chat = Chat {
            id: "19:x@thread.v2".into(),
            topic: None,
            created_date_time: None,
            members: vec![
                ChatMember { email: Some("A@contoso.com".into()), display_name: None },
                ChatMember { email: Some("b@contoso.com".into()), display_name: None },
            ],
        };
        assert!(chat.has_exact_members(&["a@contoso.com".into(), "B@CONTOSO.COM".into()]));
        assert!(!chat.has_exact_members(&["a@contoso.com".into()]));
    }
}
