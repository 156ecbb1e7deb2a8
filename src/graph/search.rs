//! SharePoint search (`/_api/search/query`)

use super::spo::SpoClient;
use crate::error::Result;
use crate::util::url::encode_component;
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Page size used when all results are requested without a row limit
pub const DEFAULT_ALL_RESULTS_ROW_LIMIT: u32 = 500;

/// Search request options; `None` leaves the SharePoint default
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query_text: String,
    pub select_properties: Option<String>,
    pub refinement_filters: Option<String>,
    pub query_template: Option<String>,
    pub sort_list: Option<String>,
    pub ranking_model_id: Option<String>,
    pub start_row: Option<u32>,
    pub row_limit: Option<u32>,
    pub source_id: Option<String>,
    pub trim_duplicates: Option<bool>,
    pub enable_stemming: Option<bool>,
    pub culture: Option<u32>,
    pub properties: Option<String>,
    pub source_name: Option<String>,
    pub refiners: Option<String>,
    pub hidden_constraints: Option<String>,
    pub client_type: Option<String>,
    pub enable_phonetic: Option<bool>,
    pub process_best_bets: Option<bool>,
    pub enable_query_rules: Option<bool>,
    pub process_personal_favorites: Option<bool>,
    pub all_results: bool,
}

impl SearchQuery {
    /// `properties` with the result source appended when a source name is set
    pub fn effective_properties(&self) -> Option<String> {
        let mut properties = self.properties.clone().unwrap_or_default();
        if let Some(source_name) = &self.source_name {
            if !properties.is_empty() && !properties.ends_with(',') {
                properties.push(',');
            }
            properties.push_str(&format!("SourceName:{},SourceLevel:SPSite", source_name));
        }
        (!properties.is_empty()).then_some(properties)
    }

    fn effective_row_limit(&self) -> Option<u32> {
        match (self.row_limit, self.all_results) {
            (Some(limit), _) => Some(limit),
            (None, true) => Some(DEFAULT_ALL_RESULTS_ROW_LIMIT),
            (None, false) => None,
        }
    }

    /// Query URL for one page starting at `start_row`
    pub fn url(&self, web_url: &str, start_row: Option<u32>) -> String {
        let mut url = format!(
            "{}/_api/search/query?querytext='{}'",
            web_url.trim_end_matches('/'),
            encode_component(&self.query_text)
        );

        let quoted = |url: &mut String, name: &str, value: &Option<String>| {
            if let Some(v) = value {
                url.push_str(&format!("&{}='{}'", name, encode_component(v)));
            }
        };
        let plain = |url: &mut String, name: &str, value: Option<String>| {
            if let Some(v) = value {
                url.push_str(&format!("&{}={}", name, v));
            }
        };

        quoted(&mut url, "selectproperties", &self.select_properties);
        quoted(&mut url, "refinementfilters", &self.refinement_filters);
        quoted(&mut url, "querytemplate", &self.query_template);
        quoted(&mut url, "sortlist", &self.sort_list);
        quoted(&mut url, "rankingmodelid", &self.ranking_model_id);
        plain(&mut url, "startrow", start_row.map(|r| r.to_string()));
        plain(&mut url, "rowlimit", self.effective_row_limit().map(|r| r.to_string()));
        quoted(&mut url, "sourceid", &self.source_id);
        plain(&mut url, "trimduplicates", self.trim_duplicates.map(|b| b.to_string()));
        plain(&mut url, "enablestemming", self.enable_stemming.map(|b| b.to_string()));
        plain(&mut url, "culture", self.culture.map(|c| c.to_string()));
        quoted(&mut url, "properties", &self.effective_properties());
        quoted(&mut url, "refiners", &self.refiners);
        quoted(&mut url, "hiddenconstraints", &self.hidden_constraints);
        quoted(&mut url, "clienttype", &self.client_type);
        plain(&mut url, "enablephonetic", self.enable_phonetic.map(|b| b.to_string()));
        plain(&mut url, "processbestbets", self.process_best_bets.map(|b| b.to_string()));
        plain(&mut url, "enablequeryrules", self.enable_query_rules.map(|b| b.to_string()));
        plain(
            &mut url,
            "processpersonalfavorites",
            self.process_personal_favorites.map(|b| b.to_string()),
        );

        url
    }
}

fn relevant_results(result: &Value) -> Option<&Value> {
    result
        .get("PrimaryQueryResult")
        .and_then(|p| p.get("RelevantResults"))
}

/// `TotalRows` of a raw search result
pub fn total_rows(result: &Value) -> u64 {
    relevant_results(result)
        .and_then(|r| r.get("TotalRows"))
        .and_then(|t| t.as_u64())
        .unwrap_or(0)
}

/// Flatten the result table rows into objects keyed by cell name
pub fn rows_from_results(results: &[Value]) -> Vec<Value> {
    results
        .iter()
        .filter_map(|r| relevant_results(r)?.get("Table")?.get("Rows")?.as_array())
        .flatten()
        .map(|row| {
            let mut obj = Map::new();
            if let Some(cells) = row.get("Cells").and_then(|c| c.as_array()) {
                for cell in cells {
                    if let Some(key) = cell.get("Key").and_then(|k| k.as_str()) {
                        obj.insert(key.to_string(), cell.get("Value").cloned().unwrap_or(Value::Null));
                    }
                }
            }
            Value::Object(obj)
        })
        .collect()
}

/// First row of the page after the one starting at `start_row`, `None` past `u32::MAX`
pub fn next_start_row(start_row: Option<u32>, row_limit: u32) -> Option<u32> {
    start_row.unwrap_or(0).checked_add(row_limit)
}

impl SpoClient {
    /// Run a search and return the raw result of every page requested.
    ///
    /// Without `all_results` one page is requested. With it, pages are
    /// requested until `TotalRows` rows were returned or a page comes back
    /// empty.
    pub async fn search(&self, web_url: &str, query: &SearchQuery) -> Result<Vec<Value>> {
        let mut results = Vec::new();
        let mut start_row = query.start_row;
        let row_limit = query.effective_row_limit().unwrap_or(DEFAULT_ALL_RESULTS_ROW_LIMIT);
        let mut collected: u64 = 0;

        loop {
            let url = query.url(web_url, start_row);
            let result: Value = self.get(&url).await?;
            let page_rows = rows_from_results(std::slice::from_ref(&result)).len() as u64;
            let total = total_rows(&result);
            collected += page_rows;
            results.push(result);

            if !query.all_results || page_rows == 0 || collected >= total {
                break;
            }

            let Some(next) = next_start_row(start_row, row_limit) else {
                warn!("Start row exceeds the largest row index, stopping after {} rows", collected);
                break;
            };
            info!("Retrieved {} of {} rows, requesting rows from {}", collected, total, next);
            start_row = Some(next);
        }

        Ok(results)
    }
}
