//! Entra ID (Azure AD) users and Microsoft 365 group conversations

use super::GraphClient;
use crate::error::Result;
use crate::util::url::encode_component;
use serde_json::Value;

pub struct AadClient<'a> {
    client: &'a GraphClient,
}

impl<'a> AadClient<'a> {
    pub fn new(client: &'a GraphClient) -> Self {
        Self { client }
    }

    /// Patch user properties; `user` is an object ID or a UPN
    pub async fn update_user(&self, user: &str, properties: &Value) -> Result<()> {
        self.client
            .patch_no_content(&format!("users/{}", encode_component(user)), properties)
            .await
    }

    /// All posts of a conversation thread in a group
    pub async fn list_thread_posts(&self, group_id: &str, thread_id: &str) -> Result<Vec<Value>> {
        self.client
            .get_all_pages(&format!("groups/{}/threads/{}/posts", group_id, thread_id))
            .await
    }
}
