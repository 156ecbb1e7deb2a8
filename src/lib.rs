//! # m365ctl
//!
//! Command-line client for Microsoft 365. Commands validate their options,
//! resolve friendly names (groups, plans, buckets, chats, lists) to IDs and
//! call Microsoft Graph or SharePoint Online REST and CSOM endpoints.

pub mod cmd;
pub mod config;
pub mod error;
pub mod graph;
pub mod output;
pub mod util;

pub use error::{M365Error, Result};
