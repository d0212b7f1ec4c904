//! Firestore recipient roster — token directory over the Firestore REST API.
//!
//! End users live in `whitelist_users`, operators in `admin_users`; both are
//! filtered to active documents server-side. Rows without a usable delivery
//! token are skipped. Queried fresh on every dispatch — no caching here.

use async_trait::async_trait;

use sigbridge_core::error::{BridgeError, Result};
use sigbridge_core::traits::RecipientStore;
use sigbridge_core::types::{Recipient, RecipientClass, RecipientFilter};

const END_USER_COLLECTION: &str = "whitelist_users";
const OPERATOR_COLLECTION: &str = "admin_users";

pub struct FirestoreRecipients {
    project_id: String,
    access_token: String,
    client: reqwest::Client,
}

impl FirestoreRecipients {
    pub fn new(project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            access_token: access_token.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Run a structured query for active documents of one collection and
    /// return their `fields` objects.
    async fn active_documents(&self, collection: &str) -> Result<Vec<serde_json::Value>> {
        let url = format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/(default)/documents:runQuery",
            self.project_id
        );
        let query = serde_json::json!({
            "structuredQuery": {
                "from": [{"collectionId": collection}],
                "where": {
                    "fieldFilter": {
                        "field": {"fieldPath": "isActive"},
                        "op": "EQUAL",
                        "value": {"booleanValue": true}
                    }
                }
            }
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(&query)
            .send()
            .await
            .map_err(|e| BridgeError::Store(format!("Firestore query failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(BridgeError::Store(format!("Firestore HTTP {status}")));
        }

        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| BridgeError::Store(format!("Invalid Firestore response: {e}")))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.get("document")?.get("fields").cloned())
            .collect())
    }
}

#[async_trait]
impl RecipientStore for FirestoreRecipients {
    async fn list_recipients(&self, filter: &RecipientFilter) -> Result<Vec<Recipient>> {
        let mut recipients = Vec::new();

        if !matches!(filter, RecipientFilter::OperatorsOnly { .. }) {
            let docs = self.active_documents(END_USER_COLLECTION).await?;
            let users: Vec<_> = docs.iter().filter_map(parse_end_user).collect();
            tracing::info!("📱 {} end users with delivery tokens", users.len());
            recipients.extend(users);
        }

        if !matches!(filter, RecipientFilter::EndUsersOnly) {
            let role_filter = match filter {
                RecipientFilter::OperatorsOnly { role } => role.as_deref(),
                _ => None,
            };
            let docs = self.active_documents(OPERATOR_COLLECTION).await?;
            let operators: Vec<_> = docs
                .iter()
                .filter_map(parse_operator)
                .filter(|op| matches_role(op, role_filter))
                .collect();
            tracing::info!("👑 {} operators with delivery tokens", operators.len());
            recipients.extend(operators);
        }

        tracing::info!("📊 total roster: {} recipients", recipients.len());
        Ok(recipients)
    }
}

fn string_field(fields: &serde_json::Value, name: &str) -> Option<String> {
    fields[name]["stringValue"].as_str().map(str::to_string)
}

fn parse_end_user(fields: &serde_json::Value) -> Option<Recipient> {
    let token = string_field(fields, "fcmToken")?;
    if token.trim().is_empty() {
        return None;
    }
    Some(Recipient {
        identifier: string_field(fields, "email").unwrap_or_default(),
        delivery_token: token,
        class: RecipientClass::EndUser,
        role: None,
    })
}

fn parse_operator(fields: &serde_json::Value) -> Option<Recipient> {
    let token = string_field(fields, "fcmToken")?;
    if token.trim().is_empty() {
        return None;
    }
    Some(Recipient {
        identifier: string_field(fields, "email").unwrap_or_default(),
        delivery_token: token,
        class: RecipientClass::Operator,
        role: string_field(fields, "role").or(Some("admin".into())),
    })
}

fn matches_role(recipient: &Recipient, role_filter: Option<&str>) -> bool {
    match role_filter {
        None => true,
        Some(wanted) => recipient.role.as_deref() == Some(wanted),
    }
}
