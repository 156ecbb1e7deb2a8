//! SharePoint Online REST and CSOM client
//!
//! SharePoint requests are addressed with absolute URLs because every command
//! targets a specific web (`https://contoso.sharepoint.com/sites/x/_api/...`).

use super::{read_json, send_with_retry};
use crate::error::{M365Error, Result};
use crate::util::url::{encode_component, escape_odata_literal, server_relative_path};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const SPO_ACCEPT: &str = "application/json;odata=nometadata";

/// Name reported to SharePoint in CSOM requests
pub const CSOM_APPLICATION_NAME: &str = concat!("m365ctl v", env!("CARGO_PKG_VERSION"));

/// SharePoint REST page: `value` plus `odata.nextLink` (nometadata flavour)
#[derive(Debug, Deserialize)]
pub struct SpoPage<T> {
    pub value: Vec<T>,
    #[serde(rename = "odata.nextLink")]
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContextInfo {
    form_digest_value: String,
}

/// How a command points at a list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListTarget {
    Id(String),
    Title(String),
    Url(String),
}

impl ListTarget {
    /// Build from the three mutually exclusive list options; `None` when
    /// none was given
    pub fn from_options(
        id: Option<&str>,
        title: Option<&str>,
        url: Option<&str>,
    ) -> Option<Self> {
        id.map(|v| ListTarget::Id(v.to_string()))
            .or_else(|| title.map(|v| ListTarget::Title(v.to_string())))
            .or_else(|| url.map(|v| ListTarget::Url(v.to_string())))
    }

    /// REST path segment under `_api/web/`
    pub fn rest_segment(&self, web_url: &str) -> Result<String> {
        Ok(match self {
            ListTarget::Id(id) => format!("lists(guid'{}')", encode_component(id)),
            ListTarget::Title(title) => {
                format!("lists/getByTitle('{}')", encode_component(&escape_odata_literal(title)))
            }
            ListTarget::Url(url) => {
                let path = server_relative_path(web_url, url)?;
                format!("GetList('{}')", encode_component(&escape_odata_literal(&path)))
            }
        })
    }
}

/// SharePoint Online client with retry support
pub struct SpoClient {
    client: Client,
    access_token: String,
    initial_backoff: Duration,
}

impl SpoClient {
    pub fn new(access_token: String) -> Self {
        Self {
            client: Client::new(),
            access_token,
            initial_backoff: Duration::from_millis(super::INITIAL_BACKOFF_MS),
        }
    }

    /// Override the first retry delay (tests use zero)
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    fn request(&self, method: Method, url: &str, headers: &[(&str, &str)]) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .bearer_auth(&self.access_token);
        if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("accept")) {
            builder = builder.header("accept", SPO_ACCEPT);
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let label = format!("{} {}", method, url);
        send_with_retry(
            || {
                let builder = self.request(method.clone(), url, headers);
                match body {
                    Some(b) => builder
                        .header("content-type", "application/json;odata=nometadata")
                        .body(b.to_string()),
                    None => builder,
                }
            },
            &label,
            self.initial_backoff,
        )
        .await
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.send(Method::GET, url, &[], None).await?;
        read_json(resp).await
    }

    /// Fetch every page of a collection, following `odata.nextLink`
    pub async fn get_all_pages<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut current = url.to_string();
        loop {
            let page: SpoPage<T> = self.get(&current).await?;
            items.extend(page.value);
            match page.next_link {
                Some(next) => current = next,
                None => break,
            }
        }
        Ok(items)
    }

    pub async fn post<T: Serialize, R: DeserializeOwned>(&self, url: &str, body: &T) -> Result<R> {
        let body = serde_json::to_value(body)?;
        let resp = self.send(Method::POST, url, &[], Some(&body)).await?;
        read_json(resp).await
    }

    /// POST with `X-HTTP-Method: DELETE`, the SharePoint way of removing
    /// an entity
    pub async fn delete_via_post(&self, url: &str) -> Result<()> {
        self.send(
            Method::POST,
            url,
            &[("X-HTTP-Method", "DELETE"), ("If-Match", "*")],
            None,
        )
        .await?;
        Ok(())
    }

    /// Form digest for the site collection, required by CSOM requests
    pub async fn request_digest(&self, site_url: &str) -> Result<String> {
        let url = format!("{}/_api/contextinfo", site_url.trim_end_matches('/'));
        let resp = self.send(Method::POST, &url, &[], None).await?;
        let info: ContextInfo = read_json(resp).await?;
        debug!("Obtained request digest for {}", site_url);
        Ok(info.form_digest_value)
    }

    /// Execute a CSOM request against `{site}/_vti_bin/client.svc/ProcessQuery`.
    ///
    /// CSOM reports failures inside a 200 response: the first element of the
    /// returned array carries `ErrorInfo`.
    pub async fn process_query(&self, site_url: &str, xml: &str) -> Result<Vec<Value>> {
        let digest = self.request_digest(site_url).await?;
        let url = format!(
            "{}/_vti_bin/client.svc/ProcessQuery",
            site_url.trim_end_matches('/')
        );
        let label = format!("POST {}", url);
        let resp = send_with_retry(
            || {
                self.request(Method::POST, &url, &[("X-RequestDigest", digest.as_str())])
                    .header("content-type", "text/xml")
                    .body(xml.to_string())
            },
            &label,
            self.initial_backoff,
        )
        .await?;

        let status = resp.status().as_u16();
        let result: Vec<Value> = read_json(resp).await?;
        check_csom_error(status, &result)?;
        Ok(result)
    }
}

fn check_csom_error(status: u16, result: &[Value]) -> Result<()> {
    let Some(error_info) = result
        .first()
        .and_then(|r| r.get("ErrorInfo"))
        .filter(|e| !e.is_null())
    else {
        return Ok(());
    };

    Err(M365Error::ApiError {
        status,
        code: error_info
            .get("ErrorTypeName")
            .and_then(|c| c.as_str())
            .map(String::from),
        message: error_info
            .get("ErrorMessage")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown CSOM error")
            .to_string(),
    })
}
