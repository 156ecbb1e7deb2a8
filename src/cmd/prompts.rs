//! Interactive confirmation for destructive commands

use crate::error::Result;
use dialoguer::{Confirm, theme::ColorfulTheme};

/// Prompt for yes/no confirmation with a default value
pub fn confirm(message: &str, default: bool) -> Result<bool> {
    let result = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(message)
        .default(default)
        .interact()?;
    Ok(result)
}

/// True when the command may proceed: confirmed on the command line or
/// accepted at the prompt (default no)
pub fn confirmed(confirm_flag: bool, message: &str) -> Result<bool> {
    if confirm_flag {
        return Ok(true);
    }
    confirm(message, false)
}
