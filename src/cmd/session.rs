//! Session commands: store, inspect and clear access tokens
//!
//! Tokens are obtained outside the tool (e.g. `az account get-access-token`)
//! and cached per resource under the config directory.

use super::Context;
use crate::config::{Resource, TokenCache};
use crate::error::{M365Error, Result};
use crate::util::access_token::AccessToken;
use crate::util::validation::ensure_sharepoint_url;
use clap::Args;
use colored::Colorize;
use serde_json::{Map, Value, json};
use tracing::info;

#[derive(Args, Debug)]
pub struct SessionSetArgs {
    /// Access token for Microsoft Graph
    #[arg(long)]
    pub graph_token: Option<String>,

    /// Access token for SharePoint Online
    #[arg(long)]
    pub spo_token: Option<String>,

    /// Tenant root SharePoint URL, e.g. https://contoso.sharepoint.com
    #[arg(long)]
    pub spo_url: Option<String>,
}

impl SessionSetArgs {
    pub fn validate(&self) -> Result<()> {
        if self.graph_token.is_none() && self.spo_token.is_none() && self.spo_url.is_none() {
            return Err(M365Error::Validation(
                "Specify at least one of the following options: graph-token, spo-token, spo-url."
                    .into(),
            ));
        }
        if let Some(url) = &self.spo_url {
            ensure_sharepoint_url(url)?;
        }
        for token in [&self.graph_token, &self.spo_token].into_iter().flatten() {
            AccessToken::parse(token)?;
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct SessionClearArgs {
    /// Also forget the stored SharePoint URL
    #[arg(long)]
    pub all: bool,
}

pub async fn set(args: SessionSetArgs, ctx: &Context) -> Result<()> {
    args.validate()?;

    for (resource, token) in [
        (Resource::Graph, args.graph_token),
        (Resource::SharePoint, args.spo_token),
    ] {
        if let Some(token) = token {
            let cache = TokenCache::from_token(token)?;
            ctx.config.save_token(resource, &cache)?;
            info!("Stored {} access token", resource.cache_name());
        }
    }

    if let Some(url) = args.spo_url {
        let mut config = ctx.config.load_config()?;
        config.spo_url = Some(url.trim_end_matches('/').to_string());
        ctx.config.save_config(&config)?;
        info!("Stored SharePoint URL");
    }

    eprintln!("{} Session updated", "✓".green().bold());
    Ok(())
}

pub async fn show(ctx: &Context) -> Result<()> {
    ctx.print(&describe(&ctx.session), &[])
}

pub async fn clear(args: SessionClearArgs, ctx: &Context) -> Result<()> {
    ctx.config.delete_token(Resource::Graph)?;
    ctx.config.delete_token(Resource::SharePoint)?;

    if args.all {
        let mut config = ctx.config.load_config()?;
        config.spo_url = None;
        ctx.config.save_config(&config)?;
    }

    eprintln!("{} Session cleared", "✓".green().bold());
    Ok(())
}

/// Summary of the session without exposing the tokens themselves
pub fn describe(session: &crate::config::Session) -> Value {
    let mut result = Map::new();

    for (name, token) in [
        ("graph", session.graph_token.as_deref()),
        ("sharePoint", session.spo_token.as_deref()),
    ] {
        let entry = match token.map(AccessToken::parse) {
            None => json!({ "connected": false }),
            Some(Err(_)) => json!({ "connected": true, "readable": false }),
            Some(Ok(claims)) => json!({
                "connected": true,
                "connectedAs": claims.user_name(),
                "appOnly": claims.is_app_only(),
                "tenantId": claims.tenant_id(),
                "expiresOn": claims.expires_at().map(|e| e.to_rfc3339()),
                "expired": claims.is_expired(),
            }),
        };
        result.insert(name.to_string(), entry);
    }

    result.insert("spoUrl".into(), json!(session.spo_url));
    Value::Object(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Session;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn token(claims: Value) -> String {
        format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(claims.to_string()))
    }

    #[test]
    fn test_set_requires_an_option() {
        let args = SessionSetArgs {
            graph_token: None,
            spo_token: None,
            spo_url: None,
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let bad_url = SessionSetArgs {
            graph_token: None,
            spo_token: None,
            spo_url: Some("https://contoso.example.com".into()),
        };
        assert_eq!(
            bad_url.validate().unwrap_err().to_string(),
            "https://contoso.example.com is not a valid SharePoint Online site URL"
        );

        let bad_token = SessionSetArgs {
            graph_token: Some("not-a-jwt".into()),
            spo_token: None,
            spo_url: None,
        };
        assert!(matches!(bad_token.validate(), Err(M365Error::AuthError(_))));
    }

    #[test]
    fn test_describe_reports_user_and_app_only() {
        let session = Session {
            graph_token: Some(token(json!({"upn": "alex@contoso.com", "scp": "User.Read"}))),
            spo_token: Some(token(json!({"roles": ["Sites.FullControl.All"]}))),
            spo_url: Some("https://contoso.sharepoint.com".into()),
        };
        let summary = describe(&session);
        assert_eq!(summary["graph"]["connectedAs"], "alex@contoso.com");
        assert_eq!(summary["graph"]["appOnly"], false);
        assert_eq!(summary["sharePoint"]["appOnly"], true);
        assert_eq!(summary["spoUrl"], "https://contoso.sharepoint.com");

        let empty = describe(&Session::default());
        assert_eq!(empty["graph"]["connected"], false);
    }
}
