//! Microsoft Teams commands

use super::Context;
use crate::error::{M365Error, Result};
use crate::graph::GraphClient;
use crate::graph::teams::TeamsClient;
use crate::output::OutputFormat;
use crate::util::access_token::AccessToken;
use crate::util::validation::{
    ensure_guid, ensure_one_of, is_valid_teams_chat_id, is_valid_user_principal_name,
};
use clap::Args;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::info;

/// Report periods accepted by the Teams usage reports
pub const REPORT_PERIODS: [&str; 4] = ["D7", "D30", "D90", "D180"];

fn ensure_chat_id(chat_id: &str) -> Result<()> {
    if is_valid_teams_chat_id(chat_id) {
        Ok(())
    } else {
        Err(M365Error::Validation(format!(
            "{} is not a valid Teams ChatId.",
            chat_id
        )))
    }
}

// ============================================
// Team Commands
// ============================================

#[derive(Args, Debug)]
pub struct TeamGetArgs {
    /// ID of the team
    #[arg(short, long)]
    pub id: Option<String>,

    /// Display name of the team
    #[arg(short, long)]
    pub name: Option<String>,
}

impl TeamGetArgs {
    pub fn validate(&self) -> Result<()> {
        ensure_one_of(&[("id", self.id.is_some()), ("name", self.name.is_some())])?;
        if let Some(id) = &self.id {
            ensure_guid(id, "id")?;
        }
        Ok(())
    }
}

pub async fn team_get(args: TeamGetArgs, ctx: &Context) -> Result<()> {
    args.validate()?;
    let client = ctx.graph()?;
    let team = get_team(&args, &client).await?;
    ctx.print(&team, &["id", "displayName", "isArchived", "description"])
}

pub async fn get_team(args: &TeamGetArgs, client: &GraphClient) -> Result<Value> {
    let teams = TeamsClient::new(client);
    let team_id = match (&args.id, &args.name) {
        (Some(id), _) => id.clone(),
        (None, Some(name)) => teams.team_id_by_name(name).await?,
        (None, None) => return Err(M365Error::Validation("Specify id or name".into())),
    };
    teams.get_team(&team_id).await
}

// ============================================
// Chat Message Commands
// ============================================

#[derive(Args, Debug)]
pub struct ChatMessageListArgs {
    /// ID of the chat conversation
    #[arg(short, long)]
    pub chat_id: String,
}

impl ChatMessageListArgs {
    pub fn validate(&self) -> Result<()> {
        ensure_chat_id(&self.chat_id)
    }
}

pub async fn chat_message_list(args: ChatMessageListArgs, ctx: &Context) -> Result<()> {
    args.validate()?;
    let client = ctx.graph()?;
    let messages = TeamsClient::new(&client)
        .list_chat_messages(&args.chat_id)
        .await?;
    ctx.print(&Value::Array(messages), &["id", "shortBody"])
}

#[derive(Args, Debug)]
pub struct ChatMessageSendArgs {
    /// ID of the chat conversation
    #[arg(long)]
    pub chat_id: Option<String>,

    /// Comma separated e-mail addresses of the chat members, excluding
    /// yourself
    #[arg(short = 'e', long)]
    pub user_emails: Option<String>,

    /// Topic of an existing group chat
    #[arg(long)]
    pub chat_name: Option<String>,

    /// Message to send
    #[arg(short, long)]
    pub message: String,
}

impl ChatMessageSendArgs {
    pub fn validate(&self) -> Result<()> {
        ensure_one_of(&[
            ("chat-id", self.chat_id.is_some()),
            ("user-emails", self.user_emails.is_some()),
            ("chat-name", self.chat_name.is_some()),
        ])?;

        if let Some(chat_id) = &self.chat_id {
            ensure_chat_id(chat_id)?;
        }

        if let Some(user_emails) = &self.user_emails {
            let emails = parse_user_emails(user_emails);
            if emails.is_empty() || !emails.iter().all(|e| is_valid_user_principal_name(e)) {
                return Err(M365Error::Validation(format!(
                    "{} contains one or more invalid email addresses.",
                    user_emails
                )));
            }
        }
        Ok(())
    }
}

/// Lowercased, comma separated e-mail list without empty entries
pub fn parse_user_emails(value: &str) -> Vec<String> {
    value
        .trim()
        .to_lowercase()
        .split(',')
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect()
}

pub async fn chat_message_send(args: ChatMessageSendArgs, ctx: &Context) -> Result<()> {
    args.validate()?;
    let client = ctx.graph()?;
    send_message(&args, &client).await?;
    Ok(())
}

/// Resolve the target chat and post the message to it
pub async fn send_message(args: &ChatMessageSendArgs, client: &GraphClient) -> Result<Value> {
    let teams = TeamsClient::new(client);

    let chat_id = if let Some(chat_id) = &args.chat_id {
        chat_id.clone()
    } else if let Some(user_emails) = &args.user_emails {
        let members = chat_members_with_current_user(client.access_token(), user_emails)?;
        teams.chat_id_for_members(&members).await?
    } else if let Some(chat_name) = &args.chat_name {
        teams.chat_id_by_name(chat_name).await?
    } else {
        return Err(M365Error::Validation(
            "Specify one of the following options: chat-id, user-emails, chat-name.".into(),
        ));
    };

    info!("Sending message to chat {}", chat_id);
    teams.send_chat_message(&chat_id, &args.message).await
}

/// The signed-in user followed by the given members
fn chat_members_with_current_user(access_token: &str, user_emails: &str) -> Result<Vec<String>> {
    let claims = AccessToken::parse(access_token)?;
    let current_user = claims.user_name().ok_or_else(|| {
        M365Error::AuthError("Unable to determine the signed-in user from the access token".into())
    })?;

    let current_user = current_user.to_lowercase();
    let others: Vec<String> = parse_user_emails(user_emails)
        .into_iter()
        .filter(|e| *e != current_user)
        .collect();

    let mut members = vec![current_user];
    members.extend(others);
    Ok(members)
}

// ============================================
// Report Commands
// ============================================

#[derive(Args, Debug)]
pub struct ReportDeviceUsageUserCountsArgs {
    /// Number of days to report on: D7, D30, D90 or D180
    #[arg(short, long)]
    pub period: String,

    /// Save the raw report to this file instead of printing it
    #[arg(long)]
    pub output_file: Option<PathBuf>,
}

impl ReportDeviceUsageUserCountsArgs {
    pub fn validate(&self) -> Result<()> {
        if !REPORT_PERIODS.contains(&self.period.as_str()) {
            return Err(M365Error::Validation(format!(
                "{} is not a valid period type. The supported values are {}",
                self.period,
                REPORT_PERIODS.join("|")
            )));
        }
        Ok(())
    }
}

pub async fn report_device_usage_user_counts(
    args: ReportDeviceUsageUserCountsArgs,
    ctx: &Context,
) -> Result<()> {
    args.validate()?;
    let client = ctx.graph()?;
    let report = TeamsClient::new(&client)
        .device_usage_user_counts(&args.period)
        .await?;

    if let Some(path) = &args.output_file {
        std::fs::write(path, &report)?;
        info!("Report saved to {}", path.display());
        return ctx.print(&Value::String(path.display().to_string()), &[]);
    }

    match ctx.output {
        OutputFormat::Json => ctx.print(&Value::Array(report_rows(&report)?), &[]),
        OutputFormat::Text | OutputFormat::Csv => {
            println!("{}", normalize_report(&report));
            Ok(())
        }
    }
}

/// Report text with the byte order mark, indentation and blank lines removed
fn normalize_report(report: &str) -> String {
    report
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convert a CSV usage report into one JSON object per row
pub fn report_rows(report: &str) -> Result<Vec<Value>> {
    let normalized = normalize_report(report);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(normalized.as_bytes());

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        rows.push(Value::Object(row));
    }
    Ok(rows)
}
