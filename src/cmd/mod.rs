//! Command implementations
//!
//! Every command follows the same flow: validate the options, load the
//! session, resolve names to IDs, call the API and print the result. The
//! API-facing part of each command is a separate function taking the client
//! so it can run against a mock server.

pub mod aad;
pub mod planner;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod spo;
pub mod teams;
pub mod todo;

use crate::config::{ConfigManager, Resource, Session};
use crate::error::Result;
use crate::graph::GraphClient;
use crate::graph::spo::SpoClient;
use crate::output::{self, OutputFormat};
use indicatif::ProgressBar;
use serde_json::Value;

/// Everything a command needs besides its own options
pub struct Context {
    pub config: ConfigManager,
    pub session: Session,
    pub output: OutputFormat,
}

impl Context {
    /// Load config and session; `output` overrides the configured format
    pub fn load(output: Option<OutputFormat>) -> Result<Self> {
        let config = ConfigManager::new()?;
        let session = Session::load(&config)?;
        let output = match output {
            Some(format) => format,
            None => config.load_config()?.output.unwrap_or_default(),
        };

        Ok(Self {
            config,
            session,
            output,
        })
    }

    pub fn graph(&self) -> Result<GraphClient> {
        Ok(GraphClient::new(
            self.session.token(Resource::Graph)?.to_string(),
        ))
    }

    pub fn spo(&self) -> Result<SpoClient> {
        Ok(SpoClient::new(
            self.session.token(Resource::SharePoint)?.to_string(),
        ))
    }

    pub fn print(&self, value: &Value, default_properties: &[&str]) -> Result<()> {
        output::print(value, self.output, default_properties)
    }

    /// Spinner for long operations, only shown with text output
    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        (self.output == OutputFormat::Text).then(|| progress::create_spinner(message))
    }
}
