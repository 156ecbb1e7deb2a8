//! SharePoint Online commands

use super::{Context, progress, prompts};
use crate::error::{M365Error, Result};
use crate::graph::search::{SearchQuery, rows_from_results};
use crate::graph::sharepoint::field_options_mask;
use crate::graph::spo::{ListTarget, SpoClient};
use crate::util::url::admin_url;
use crate::util::validation::{
    ensure_at_most_one_of, ensure_guid, ensure_one_of, ensure_sharepoint_url, split_list,
};
use clap::Args;
use serde_json::Value;
use tracing::{info, warn};

const SORT_DIRECTIONS: [&str; 2] = ["ascending", "descending"];

// ============================================
// List Targeting
// ============================================

/// Options pointing a command at a list instead of the web
#[derive(Args, Debug, Default, Clone)]
pub struct ListOptions {
    /// ID of the list
    #[arg(long)]
    pub list_id: Option<String>,

    /// Title of the list
    #[arg(long)]
    pub list_title: Option<String>,

    /// Server- or web-relative URL of the list
    #[arg(long)]
    pub list_url: Option<String>,
}

impl ListOptions {
    fn option_set(&self) -> [(&'static str, bool); 3] {
        [
            ("list-id", self.list_id.is_some()),
            ("list-title", self.list_title.is_some()),
            ("list-url", self.list_url.is_some()),
        ]
    }

    /// Validate the list options; `required` demands exactly one of them
    pub fn validate(&self, required: bool) -> Result<()> {
        if required {
            ensure_one_of(&self.option_set())?;
        } else {
            ensure_at_most_one_of(&self.option_set())?;
        }
        if let Some(id) = &self.list_id {
            ensure_guid(id, "list-id")?;
        }
        Ok(())
    }

    pub fn target(&self) -> Option<ListTarget> {
        ListTarget::from_options(
            self.list_id.as_deref(),
            self.list_title.as_deref(),
            self.list_url.as_deref(),
        )
    }
}

// ============================================
// Field Commands
// ============================================

#[derive(Args, Debug, Default)]
pub struct FieldAddArgs {
    /// URL of the site where the field should be created
    #[arg(short = 'u', long)]
    pub web_url: String,

    /// CAML field definition
    #[arg(short, long)]
    pub xml: String,

    #[command(flatten)]
    pub list: ListOptions,

    /// Comma separated field options, e.g. AddToDefaultContentType,AddFieldToDefaultView
    #[arg(long)]
    pub options: Option<String>,
}

impl FieldAddArgs {
    pub fn validate(&self) -> Result<()> {
        ensure_sharepoint_url(&self.web_url)?;
        self.list.validate(false)?;
        if let Some(options) = &self.options {
            field_options_mask(options)?;
        }
        Ok(())
    }
}

pub async fn field_add(args: FieldAddArgs, ctx: &Context) -> Result<()> {
    args.validate()?;
    let spo = ctx.spo()?;
    let mask = match &args.options {
        Some(options) => field_options_mask(options)?,
        None => 0,
    };
    let field = spo
        .add_field(&args.web_url, args.list.target().as_ref(), &args.xml, mask)
        .await?;
    ctx.print(&field, &["Id", "InternalName", "Title", "Group"])
}

#[derive(Args, Debug, Default)]
pub struct FieldRemoveArgs {
    /// URL of the site where the field is located
    #[arg(short = 'u', long)]
    pub web_url: String,

    /// ID of the field
    #[arg(short, long)]
    pub id: Option<String>,

    /// Internal name or title of the field
    #[arg(short, long)]
    pub title: Option<String>,

    /// Deprecated, use --title
    #[arg(long, hide = true)]
    pub field_title: Option<String>,

    /// Remove every field of this group
    #[arg(short, long)]
    pub group: Option<String>,

    #[command(flatten)]
    pub list: ListOptions,

    /// Don't prompt for confirmation
    #[arg(long)]
    pub confirm: bool,
}

impl FieldRemoveArgs {
    fn effective_title(&self) -> Option<&str> {
        self.title.as_deref().or(self.field_title.as_deref())
    }

    pub fn validate(&self) -> Result<()> {
        ensure_sharepoint_url(&self.web_url)?;
        ensure_one_of(&[
            ("id", self.id.is_some()),
            ("title", self.title.is_some()),
            ("field-title", self.field_title.is_some()),
            ("group", self.group.is_some()),
        ])?;
        if let Some(id) = &self.id {
            ensure_guid(id, "id")?;
        }
        self.list.validate(false)
    }

    fn prompt(&self) -> String {
        let scope = match self.list.target() {
            Some(_) => "list",
            None => "site",
        };
        match (&self.group, self.id.as_deref().or(self.effective_title())) {
            (Some(group), _) => format!(
                "Are you sure you want to remove all fields from group {} of the {}?",
                group, scope
            ),
            (None, Some(field)) => format!(
                "Are you sure you want to remove the field {} from the {}?",
                field, scope
            ),
            (None, None) => format!("Are you sure you want to remove the field from the {}?", scope),
        }
    }
}

pub async fn field_remove(args: FieldRemoveArgs, ctx: &Context) -> Result<()> {
    args.validate()?;
    if args.field_title.is_some() {
        warn!("Option 'field-title' is deprecated. Please use 'title' instead.");
    }

    if !prompts::confirmed(args.confirm, &args.prompt())? {
        info!("Field removal cancelled");
        return Ok(());
    }

    let spo = ctx.spo()?;
    let spinner = args
        .group
        .as_ref()
        .and_then(|g| ctx.spinner(&format!("Removing fields in group {}...", g)));
    let result = remove_fields(&args, &spo).await;
    match &result {
        Ok(removed) => progress::finish(spinner, true, &format!("Removed {} field(s)", removed.len())),
        Err(_) => progress::finish(spinner, false, "Field removal failed"),
    }
    result.map(|_| ())
}

/// Remove the field(s) the options select; returns what was removed
pub async fn remove_fields(args: &FieldRemoveArgs, spo: &SpoClient) -> Result<Vec<String>> {
    let list = args.list.target();

    if let Some(id) = &args.id {
        spo.remove_field_by_id(&args.web_url, list.as_ref(), id).await?;
        return Ok(vec![id.clone()]);
    }
    if let Some(title) = args.effective_title() {
        spo.remove_field_by_title(&args.web_url, list.as_ref(), title)
            .await?;
        return Ok(vec![title.to_string()]);
    }
    if let Some(group) = &args.group {
        return spo
            .remove_fields_in_group(&args.web_url, list.as_ref(), group)
            .await;
    }

    Err(M365Error::Validation(
        "Specify one of the following options: id, title, group.".into(),
    ))
}

// ============================================
// Search Commands
// ============================================

#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Query to execute (KQL)
    #[arg(short, long)]
    pub query_text: String,

    /// Comma separated managed properties to retrieve
    #[arg(short = 'p', long)]
    pub select_properties: Option<String>,

    /// Retrieve all results, paging through them
    #[arg(long)]
    pub all_results: bool,

    /// Number of rows per page
    #[arg(long)]
    pub row_limit: Option<u32>,

    /// First row to return
    #[arg(long)]
    pub start_row: Option<u32>,

    /// Sort order, e.g. Rank:ascending,Created:descending
    #[arg(long)]
    pub sort_list: Option<String>,

    #[arg(long)]
    pub trim_duplicates: Option<bool>,

    #[arg(long)]
    pub enable_stemming: Option<bool>,

    /// Locale ID, e.g. 1033
    #[arg(long)]
    pub culture: Option<u32>,

    #[arg(long)]
    pub refinement_filters: Option<String>,

    #[arg(long)]
    pub query_template: Option<String>,

    /// Result source ID
    #[arg(long)]
    pub source_id: Option<String>,

    /// Ranking model ID
    #[arg(long)]
    pub ranking_model_id: Option<String>,

    /// Additional query properties
    #[arg(long)]
    pub properties: Option<String>,

    /// Result source name, added to the query properties
    #[arg(long)]
    pub source_name: Option<String>,

    #[arg(long)]
    pub refiners: Option<String>,

    /// Web to search in (defaults to the session SharePoint URL)
    #[arg(short = 'u', long)]
    pub web_url: Option<String>,

    #[arg(long)]
    pub hidden_constraints: Option<String>,

    #[arg(long)]
    pub client_type: Option<String>,

    #[arg(long)]
    pub enable_phonetic: Option<bool>,

    #[arg(long)]
    pub process_best_bets: Option<bool>,

    #[arg(long)]
    pub enable_query_rules: Option<bool>,

    #[arg(long)]
    pub process_personal_favorites: Option<bool>,

    /// Print the raw search responses
    #[arg(long)]
    pub raw_output: bool,
}

/// `prop:ascending|descending` entries separated by commas
pub fn is_valid_sort_list(value: &str) -> bool {
    value.split(',').all(|entry| match entry.split_once(':') {
        Some((property, direction)) => {
            !property.is_empty()
                && property.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && SORT_DIRECTIONS.iter().any(|d| d.eq_ignore_ascii_case(direction))
        }
        None => false,
    })
}

impl SearchArgs {
    pub fn validate(&self) -> Result<()> {
        if let Some(id) = &self.source_id {
            ensure_guid(id, "source-id")?;
        }
        if let Some(id) = &self.ranking_model_id {
            ensure_guid(id, "ranking-model-id")?;
        }
        if let Some(sort_list) = &self.sort_list {
            if !is_valid_sort_list(sort_list) {
                return Err(M365Error::Validation(format!(
                    "sort-list contains invalid value {}. Use property:ascending or property:descending",
                    sort_list
                )));
            }
        }
        if let Some(web_url) = &self.web_url {
            ensure_sharepoint_url(web_url)?;
        }
        Ok(())
    }

    pub fn query(&self) -> SearchQuery {
        SearchQuery {
            query_text: self.query_text.clone(),
            select_properties: self.select_properties.clone(),
            refinement_filters: self.refinement_filters.clone(),
            query_template: self.query_template.clone(),
            sort_list: self.sort_list.clone(),
            ranking_model_id: self.ranking_model_id.clone(),
            start_row: self.start_row,
            row_limit: self.row_limit,
            source_id: self.source_id.clone(),
            trim_duplicates: self.trim_duplicates,
            enable_stemming: self.enable_stemming,
            culture: self.culture,
            properties: self.properties.clone(),
            source_name: self.source_name.clone(),
            refiners: self.refiners.clone(),
            hidden_constraints: self.hidden_constraints.clone(),
            client_type: self.client_type.clone(),
            enable_phonetic: self.enable_phonetic,
            process_best_bets: self.process_best_bets,
            enable_query_rules: self.enable_query_rules,
            process_personal_favorites: self.process_personal_favorites,
            all_results: self.all_results,
        }
    }

    /// Properties shown in text and csv output
    pub fn default_properties(&self) -> Vec<String> {
        match &self.select_properties {
            Some(select) if !split_list(select).is_empty() => split_list(select),
            _ => vec!["Title".into(), "OriginalPath".into()],
        }
    }

    /// Shape the raw responses into the command output
    pub fn output(&self, mut results: Vec<Value>) -> Value {
        if !self.raw_output {
            return Value::Array(rows_from_results(&results));
        }
        if self.all_results || results.len() != 1 {
            Value::Array(results)
        } else {
            results.remove(0)
        }
    }
}

pub async fn search(args: SearchArgs, ctx: &Context) -> Result<()> {
    args.validate()?;
    let web_url = match &args.web_url {
        Some(url) => url.clone(),
        None => ctx.session.spo_url()?.to_string(),
    };

    let spo = ctx.spo()?;
    let spinner = if args.all_results {
        ctx.spinner("Retrieving search results...")
    } else {
        None
    };
    let results = match spo.search(&web_url, &args.query()).await {
        Ok(results) => {
            progress::finish(spinner, true, &format!("Retrieved {} page(s)", results.len()));
            results
        }
        Err(e) => {
            progress::finish(spinner, false, "Search failed");
            return Err(e);
        }
    };

    let properties = args.default_properties();
    let properties: Vec<&str> = properties.iter().map(String::as_str).collect();
    ctx.print(&args.output(results), &properties)
}

// ============================================
// List Commands
// ============================================

#[derive(Args, Debug, Default)]
pub struct ListLabelGetArgs {
    /// URL of the site where the list is located
    #[arg(short = 'u', long)]
    pub web_url: String,

    #[command(flatten)]
    pub list: ListOptions,
}

impl ListLabelGetArgs {
    pub fn validate(&self) -> Result<()> {
        ensure_sharepoint_url(&self.web_url)?;
        self.list.validate(true)
    }
}

pub async fn list_label_get(args: ListLabelGetArgs, ctx: &Context) -> Result<()> {
    args.validate()?;
    let target = args.list.target().ok_or_else(|| {
        M365Error::Validation(
            "Specify one of the following options: list-id, list-title, list-url.".into(),
        )
    })?;

    let spo = ctx.spo()?;
    match spo.list_compliance_tag(&args.web_url, &target).await? {
        Some(tag) => ctx.print(&tag, &["TagName", "TagId", "HasRetentionAction"]),
        None => Ok(()),
    }
}

// ============================================
// Site Design Commands
// ============================================

#[derive(Args, Debug, Default)]
pub struct SiteDesignApplyArgs {
    /// ID of the site design
    #[arg(short, long)]
    pub id: String,

    /// URL of the site to apply the design to
    #[arg(short = 'u', long)]
    pub web_url: String,

    /// Queue the design as a task instead of applying it right away
    #[arg(long)]
    pub as_task: bool,
}

impl SiteDesignApplyArgs {
    pub fn validate(&self) -> Result<()> {
        ensure_guid(&self.id, "id")?;
        ensure_sharepoint_url(&self.web_url)
    }
}

pub async fn site_design_apply(args: SiteDesignApplyArgs, ctx: &Context) -> Result<()> {
    args.validate()?;
    let spo = ctx.spo()?;
    let result = spo
        .apply_site_design(&args.web_url, &args.id, args.as_task)
        .await?;
    ctx.print(&result, &["Title", "OutcomeCode", "Outcome"])
}

// ============================================
// Folder Commands
// ============================================

#[derive(Args, Debug, Default)]
pub struct FolderListArgs {
    /// URL of the site where the folders are located
    #[arg(short = 'u', long)]
    pub web_url: String,

    /// Server- or site-relative URL of the parent folder
    #[arg(short = 'p', long)]
    pub parent_folder_url: String,

    /// Include all nested folders
    #[arg(short, long)]
    pub recursive: bool,
}

impl FolderListArgs {
    pub fn validate(&self) -> Result<()> {
        ensure_sharepoint_url(&self.web_url)
    }
}

pub async fn folder_list(args: FolderListArgs, ctx: &Context) -> Result<()> {
    args.validate()?;
    let spo = ctx.spo()?;
    let folders = spo
        .list_folders(&args.web_url, &args.parent_folder_url, args.recursive)
        .await?;
    ctx.print(&Value::Array(folders), &["Name", "ServerRelativeUrl"])
}

// ============================================
// Organization Assets Commands
// ============================================

#[derive(Args, Debug, Default)]
pub struct OrgAssetsLibraryRemoveArgs {
    /// Server-relative URL of the library
    #[arg(long)]
    pub library_url: String,

    /// Don't prompt for confirmation
    #[arg(long)]
    pub confirm: bool,
}

pub async fn org_assets_library_remove(
    args: OrgAssetsLibraryRemoveArgs,
    ctx: &Context,
) -> Result<()> {
    let message = format!(
        "Are you sure you want to remove the library {} as organization asset library?",
        args.library_url
    );
    if !prompts::confirmed(args.confirm, &message)? {
        info!("Organization assets library removal cancelled");
        return Ok(());
    }

    let admin = admin_url(ctx.session.spo_url()?)?;
    let spo = ctx.spo()?;
    spo.remove_org_assets_library(&admin, &args.library_url)
        .await
}
