//! Entra ID (Azure AD) commands: users and Microsoft 365 group conversations

use super::Context;
use crate::error::{M365Error, Result};
use crate::graph::GraphClient;
use crate::graph::aad::AadClient;
use crate::graph::lookup::group_id_by_name;
use crate::util::validation::{ensure_guid, ensure_one_of};
use clap::Args;
use serde_json::{Map, Value};

// ============================================
// User Commands
// ============================================

#[derive(Args, Debug, Default)]
pub struct UserSetArgs {
    /// Object ID of the user
    #[arg(long)]
    pub object_id: Option<String>,

    /// User principal name of the user
    #[arg(long)]
    pub user_principal_name: Option<String>,

    /// Enable or disable the account
    #[arg(long)]
    pub account_enabled: Option<bool>,

    /// User property to set, as Name=Value (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub properties: Vec<String>,
}

impl UserSetArgs {
    pub fn validate(&self) -> Result<()> {
        ensure_one_of(&[
            ("object-id", self.object_id.is_some()),
            ("user-principal-name", self.user_principal_name.is_some()),
        ])?;
        if let Some(id) = &self.object_id {
            ensure_guid(id, "object-id")?;
        }
        if self.account_enabled.is_none() && self.properties.is_empty() {
            return Err(M365Error::Validation(
                "Specify at least one property to update with --account-enabled or --set".into(),
            ));
        }
        self.patch_body().map(|_| ())
    }

    /// Properties to patch; `true`/`false` values become booleans
    pub fn patch_body(&self) -> Result<Value> {
        let mut body = Map::new();

        for property in &self.properties {
            let (name, value) = property
                .split_once('=')
                .filter(|(name, _)| !name.trim().is_empty())
                .ok_or_else(|| {
                    M365Error::Validation(format!(
                        "{} is not a valid property. Use Name=Value",
                        property
                    ))
                })?;
            let value = match value {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                other => Value::String(other.to_string()),
            };
            body.insert(name.trim().to_string(), value);
        }

        if let Some(enabled) = self.account_enabled {
            body.insert("accountEnabled".into(), Value::Bool(enabled));
        }

        Ok(Value::Object(body))
    }
}

pub async fn user_set(args: UserSetArgs, ctx: &Context) -> Result<()> {
    args.validate()?;
    let client = ctx.graph()?;
    set_user(&args, &client).await
}

pub async fn set_user(args: &UserSetArgs, client: &GraphClient) -> Result<()> {
    let user = args
        .object_id
        .as_deref()
        .or(args.user_principal_name.as_deref())
        .ok_or_else(|| {
            M365Error::Validation(
                "Specify one of the following options: object-id, user-principal-name.".into(),
            )
        })?;
    AadClient::new(client).update_user(user, &args.patch_body()?).await
}

// ============================================
// Group Conversation Commands
// ============================================

#[derive(Args, Debug, Default)]
pub struct ConversationPostListArgs {
    /// ID of the Microsoft 365 group
    #[arg(short = 'i', long)]
    pub group_id: Option<String>,

    /// Display name of the Microsoft 365 group
    #[arg(short = 'd', long)]
    pub group_display_name: Option<String>,

    /// ID of the conversation thread
    #[arg(short, long)]
    pub thread_id: String,
}

impl ConversationPostListArgs {
    pub fn validate(&self) -> Result<()> {
        ensure_one_of(&[
            ("group-id", self.group_id.is_some()),
            ("group-display-name", self.group_display_name.is_some()),
        ])?;
        if let Some(id) = &self.group_id {
            ensure_guid(id, "group-id")?;
        }
        Ok(())
    }
}

pub async fn conversation_post_list(args: ConversationPostListArgs, ctx: &Context) -> Result<()> {
    args.validate()?;
    let client = ctx.graph()?;
    let posts = list_posts(&args, &client).await?;
    ctx.print(&Value::Array(posts), &["receivedDateTime", "id"])
}

pub async fn list_posts(args: &ConversationPostListArgs, client: &GraphClient) -> Result<Vec<Value>> {
    let group_id = match (&args.group_id, &args.group_display_name) {
        (Some(id), _) => id.clone(),
        (None, Some(name)) => group_id_by_name(client, name).await?,
        (None, None) => {
            return Err(M365Error::Validation(
                "Specify one of the following options: group-id, group-display-name.".into(),
            ));
        }
    };
    AadClient::new(client)
        .list_thread_posts(&group_id, &args.thread_id)
        .await
}
