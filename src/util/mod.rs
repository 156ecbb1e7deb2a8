//! Small helpers shared by the command modules: option validation,
//! access-token inspection and URL building.

pub mod access_token;
pub mod url;
pub mod validation;
