//! SharePoint Online REST operations
//!
//! Site and list columns, list compliance labels, site designs, folders and
//! the organization assets library (CSOM).

use super::spo::{CSOM_APPLICATION_NAME, ListTarget, SpoClient};
use crate::error::{M365Error, Result};
use crate::util::url::{encode_component, escape_odata_literal, server_relative_path, tenant_root};
use quick_xml::escape::escape;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

// ============================================================================
// Field options
// ============================================================================

/// `AddFieldOptions` flags accepted by `CreateFieldAsXml`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddFieldOption {
    DefaultValue,
    AddToDefaultContentType,
    AddToNoContentType,
    AddToAllContentTypes,
    AddFieldInternalNameHint,
    AddFieldToDefaultView,
    AddFieldCheckDisplayName,
}

impl AddFieldOption {
    pub const ALL: [AddFieldOption; 7] = [
        AddFieldOption::DefaultValue,
        AddFieldOption::AddToDefaultContentType,
        AddFieldOption::AddToNoContentType,
        AddFieldOption::AddToAllContentTypes,
        AddFieldOption::AddFieldInternalNameHint,
        AddFieldOption::AddFieldToDefaultView,
        AddFieldOption::AddFieldCheckDisplayName,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AddFieldOption::DefaultValue => "DefaultValue",
            AddFieldOption::AddToDefaultContentType => "AddToDefaultContentType",
            AddFieldOption::AddToNoContentType => "AddToNoContentType",
            AddFieldOption::AddToAllContentTypes => "AddToAllContentTypes",
            AddFieldOption::AddFieldInternalNameHint => "AddFieldInternalNameHint",
            AddFieldOption::AddFieldToDefaultView => "AddFieldToDefaultView",
            AddFieldOption::AddFieldCheckDisplayName => "AddFieldCheckDisplayName",
        }
    }

    pub fn flag(&self) -> u32 {
        match self {
            AddFieldOption::DefaultValue => 0,
            AddFieldOption::AddToDefaultContentType => 1,
            AddFieldOption::AddToNoContentType => 2,
            AddFieldOption::AddToAllContentTypes => 4,
            AddFieldOption::AddFieldInternalNameHint => 8,
            AddFieldOption::AddFieldToDefaultView => 16,
            AddFieldOption::AddFieldCheckDisplayName => 32,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.name() == name)
    }
}

/// Combine a comma separated list of option names into the bitmask.
/// Names are case sensitive.
pub fn field_options_mask(options: &str) -> Result<u32> {
    options
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .try_fold(0, |mask, name| match AddFieldOption::parse(name) {
            Some(option) => Ok(mask | option.flag()),
            None => Err(M365Error::Validation(format!(
                "Option {} is not recognized as valid choice. Please note values are case sensitive. Allowed values are {}",
                name,
                AddFieldOption::ALL.map(|o| o.name()).join("|")
            ))),
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FieldSummary {
    id: String,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    internal_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RootFolder {
    server_relative_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListRootFolder {
    root_folder: RootFolder,
}

/// `{web}/_api/web` or `{web}/_api/web/<list>`
fn web_or_list_api(web_url: &str, list: Option<&ListTarget>) -> Result<String> {
    let web_api = format!("{}/_api/web", web_url.trim_end_matches('/'));
    match list {
        Some(target) => Ok(format!("{}/{}", web_api, target.rest_segment(web_url)?)),
        None => Ok(web_api),
    }
}

impl SpoClient {
    // ========================================================================
    // Fields
    // ========================================================================

    /// Create a site column, or a list column when a list is given
    pub async fn add_field(
        &self,
        web_url: &str,
        list: Option<&ListTarget>,
        schema_xml: &str,
        options: u32,
    ) -> Result<Value> {
        let url = format!("{}/fields/CreateFieldAsXml", web_or_list_api(web_url, list)?);
        let body = json!({
            "parameters": {
                "SchemaXml": schema_xml,
                "Options": options
            }
        });
        self.post(&url, &body).await
    }

    pub async fn remove_field_by_id(
        &self,
        web_url: &str,
        list: Option<&ListTarget>,
        field_id: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/fields/getbyid('{}')",
            web_or_list_api(web_url, list)?,
            encode_component(field_id)
        );
        info!("Removing field {}", field_id);
        self.delete_via_post(&url).await
    }

    pub async fn remove_field_by_title(
        &self,
        web_url: &str,
        list: Option<&ListTarget>,
        title: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/fields/getbyinternalnameortitle('{}')",
            web_or_list_api(web_url, list)?,
            encode_component(&escape_odata_literal(title))
        );
        info!("Removing field {}", title);
        self.delete_via_post(&url).await
    }

    /// Remove every field of a group one after another. Stops at the first
    /// failure. Returns the IDs of the removed fields.
    pub async fn remove_fields_in_group(
        &self,
        web_url: &str,
        list: Option<&ListTarget>,
        group: &str,
    ) -> Result<Vec<String>> {
        let url = format!("{}/fields", web_or_list_api(web_url, list)?);
        let fields: Vec<FieldSummary> = self.get_all_pages(&url).await?;

        let mut removed = Vec::new();
        for field in fields.iter().filter(|f| f.group.as_deref() == Some(group)) {
            info!(
                "Removing field {} ({}) from group {}",
                field.internal_name.as_deref().unwrap_or_default(),
                field.id,
                group
            );
            self.remove_field_by_id(web_url, list, &field.id).await?;
            removed.push(field.id.clone());
        }

        if removed.is_empty() {
            info!("No fields found in group {}", group);
        }
        Ok(removed)
    }

    // ========================================================================
    // Lists
    // ========================================================================

    /// Retention label applied to a list, `None` when the list has none
    pub async fn list_compliance_tag(
        &self,
        web_url: &str,
        list: &ListTarget,
    ) -> Result<Option<Value>> {
        let list_url = format!(
            "{}/{}?$expand=RootFolder&$select=RootFolder",
            web_or_list_api(web_url, None)?,
            list.rest_segment(web_url)?
        );
        let list_info: ListRootFolder = self.get(&list_url).await?;
        let absolute_list_url = format!(
            "{}{}",
            tenant_root(web_url)?,
            list_info.root_folder.server_relative_url
        );

        let tag: Value = self
            .post(
                &format!(
                    "{}/_api/SP_CompliancePolicy_SPPolicyStoreProxy_GetListComplianceTag",
                    web_url.trim_end_matches('/')
                ),
                &json!({ "listUrl": absolute_list_url }),
            )
            .await?;

        if tag.is_null() || tag.get("odata.null").and_then(|v| v.as_bool()) == Some(true) {
            info!("No label found");
            return Ok(None);
        }
        Ok(Some(tag))
    }

    // ========================================================================
    // Site designs
    // ========================================================================

    /// Apply a site design to a site, immediately or as a queued task
    pub async fn apply_site_design(
        &self,
        web_url: &str,
        site_design_id: &str,
        as_task: bool,
    ) -> Result<Value> {
        let method = if as_task {
            "AddSiteDesignTask"
        } else {
            "ApplySiteDesign"
        };
        let url = format!(
            "{}/_api/Microsoft.Sharepoint.Utilities.WebTemplateExtensions.SiteScriptUtility.{}",
            tenant_root(web_url)?,
            method
        );
        let body = json!({
            "siteDesignId": site_design_id,
            "webUrl": web_url
        });

        let result: Value = self.post(&url, &body).await?;
        if as_task {
            Ok(result)
        } else {
            Ok(result.get("value").cloned().unwrap_or(result))
        }
    }

    // ========================================================================
    // Folders
    // ========================================================================

    /// Folders under a parent folder, optionally with all descendants
    /// (depth first, each folder followed by its subtree before its next sibling)
    pub async fn list_folders(
        &self,
        web_url: &str,
        parent_folder_url: &str,
        recursive: bool,
    ) -> Result<Vec<Value>> {
        let root = server_relative_path(web_url, parent_folder_url)?;
        let mut pending = self.child_folders(web_url, &root).await?;
        pending.reverse();
        let mut folders = Vec::new();

        while let Some(folder) = pending.pop() {
            if recursive {
                if let Some(url) = folder.get("ServerRelativeUrl").and_then(|u| u.as_str()) {
                    let mut children = self.child_folders(web_url, url).await?;
                    children.reverse();
                    pending.extend(children);
                }
            }
            folders.push(folder);
        }

        Ok(folders)
    }

    async fn child_folders(&self, web_url: &str, folder: &str) -> Result<Vec<Value>> {
        let url = format!(
            "{}/GetFolderByServerRelativeUrl('{}')/folders",
            web_or_list_api(web_url, None)?,
            encode_component(&escape_odata_literal(folder))
        );
        self.get_all_pages(&url).await
    }

    // ========================================================================
    // Organization assets
    // ========================================================================

    /// Unregister a library as organization assets library (tenant admin)
    pub async fn remove_org_assets_library(&self, admin_url: &str, library_url: &str) -> Result<()> {
        let xml = remove_org_assets_xml(library_url);
        self.process_query(admin_url, &xml).await?;
        Ok(())
    }
}

/// CSOM request calling `Tenant.RemoveFromOrgAssets`
pub fn remove_org_assets_xml(library_url: &str) -> String {
    format!(
        r#"<Request AddExpandoFieldTypeSuffix="true" SchemaVersion="15.0.0.0" LibraryVersion="16.0.0.0" ApplicationName="{}" xmlns="http://schemas.microsoft.com/sharepoint/clientquery/2009"><Actions><ObjectPath Id="9" ObjectPathId="8" /><Method Name="RemoveFromOrgAssets" Id="10" ObjectPathId="8"><Parameters><Parameter Type="String">{}</Parameter><Parameter Type="Guid">{{00000000-0000-0000-0000-000000000000}}</Parameter></Parameters></Method></Actions><ObjectPaths><Constructor Id="8" TypeId="{{268004ae-ef6b-4e9b-8425-127220d84719}}" /></ObjectPaths></Request>"#,
        escape(CSOM_APPLICATION_NAME),
        escape(library_url)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_options_mask() {
        assert_eq!(field_options_mask("DefaultValue").unwrap(), 0);
        assert_eq!(
            field_options_mask("AddToAllContentTypes, AddFieldToDefaultView, AddFieldCheckDisplayName")
                .unwrap(),
            52
        );
        assert_eq!(
            field_options_mask("AddToDefaultContentType,AddFieldInternalNameHint").unwrap(),
            9
        );
        assert_eq!(field_options_mask("AddToNoContentType").unwrap(), 2);
    }

    #[test]
    fn test_field_options_mask_rejects_unknown_and_case() {
        assert!(field_options_mask("invalid").is_err());
        assert!(field_options_mask("defaultvalue").is_err());
    }

    #[test]
    fn test_web_or_list_api() {
        let web = "https://contoso.sharepoint.com/sites/sales/";
        assert_eq!(
            web_or_list_api(web, None).unwrap(),
            "https://contoso.sharepoint.com/sites/sales/_api/web"
        );
        assert_eq!(
            web_or_list_api(web, Some(&ListTarget::Title("Events".into()))).unwrap(),
            "https://contoso.sharepoint.com/sites/sales/_api/web/lists/getByTitle('Events')"
        );
    }

    #[test]
    fn test_remove_org_assets_xml() {
        let xml = remove_org_assets_xml("/sites/branding/assets");
        assert!(xml.contains(r#"<Parameter Type="String">/sites/branding/assets</Parameter>"#));
        assert!(xml.contains(r#"<Parameter Type="Guid">{00000000-0000-0000-0000-000000000000}</Parameter>"#));
        assert!(xml.contains(r#"TypeId="{268004ae-ef6b-4e9b-8425-127220d84719}""#));
        assert!(xml.starts_with(r#"<Request AddExpandoFieldTypeSuffix="true""#));
    }

    #[test]
    fn test_xml_escape() {
        let xml = remove_org_assets_xml("/sites/a&b/<lib>'s \"assets\"");
        assert!(xml.contains(
            r#"<Parameter Type="String">/sites/a&amp;b/&lt;lib&gt;&apos;s &quot;assets&quot;</Parameter>"#
        ));
    }
}
