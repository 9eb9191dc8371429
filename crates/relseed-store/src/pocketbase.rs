use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use relseed_core::{Record, record_to_json};

use crate::error::StoreError;
use crate::gateway::StoreGateway;

const REQUEST_TIMEOUT_SECS: u64 = 60;
const NOT_UNIQUE_CODE: &str = "validation_not_unique";

/// REST gateway for a PocketBase instance.
pub struct PocketBaseGateway {
    http: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RecordList {
    #[serde(default)]
    items: Vec<CreatedRecord>,
    #[serde(default, rename = "totalItems")]
    total_items: u64,
}

impl PocketBaseGateway {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|token| !token.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn records_url(&self, entity: &str) -> String {
        format!("{}/api/collections/{}/records", self.base_url, entity)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let body: Value = serde_json::from_str(&body).unwrap_or(Value::String(body));
        Err(classify_failure(status.as_u16(), &body))
    }

    async fn list(&self, entity: &str, per_page: usize) -> Result<RecordList, StoreError> {
        let request = self.http.get(self.records_url(entity)).query(&[
            ("page", "1".to_string()),
            ("perPage", per_page.to_string()),
            ("fields", "id".to_string()),
        ]);
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl StoreGateway for PocketBaseGateway {
    fn engine(&self) -> &'static str {
        "pocketbase"
    }

    async fn create(&self, entity: &str, fields: &Record) -> Result<String, StoreError> {
        let request = self
            .http
            .post(self.records_url(entity))
            .json(&record_to_json(fields));
        let response = self.send(request).await?;
        let created: CreatedRecord = response.json().await?;
        debug!(entity = %entity, id = %created.id, "record created");
        Ok(created.id)
    }

    async fn patch(&self, entity: &str, id: &str, fields: &Record) -> Result<(), StoreError> {
        let url = format!("{}/{}", self.records_url(entity), id);
        let request = self.http.patch(url).json(&record_to_json(fields));
        self.send(request).await?;
        Ok(())
    }

    async fn list_ids(&self, entity: &str, page_size: usize) -> Result<Vec<String>, StoreError> {
        let list = self.list(entity, page_size.max(1)).await?;
        Ok(list.items.into_iter().map(|item| item.id).collect())
    }

    async fn count(&self, entity: &str) -> Result<u64, StoreError> {
        Ok(self.list(entity, 1).await?.total_items)
    }
}

/// Map a non-success PocketBase response onto the gateway error taxonomy.
///
/// PocketBase reports field problems as `{"data": {"<field>": {"code": ..}}}`.
pub fn classify_failure(status: u16, body: &Value) -> StoreError {
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| match body {
            Value::String(text) => text.chars().take(200).collect(),
            _ => String::new(),
        });

    if status == 401 || status == 403 {
        return StoreError::Forbidden(message);
    }

    let field_errors: Vec<(String, String)> = body
        .get("data")
        .and_then(Value::as_object)
        .map(|data| {
            data.iter()
                .map(|(field, detail)| {
                    let code = detail
                        .get("code")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    (field.clone(), code)
                })
                .collect()
        })
        .unwrap_or_default();

    if status == 400 && !field_errors.is_empty() {
        let conflicting: Vec<String> = field_errors
            .iter()
            .filter(|(_, code)| code == NOT_UNIQUE_CODE)
            .map(|(field, _)| field.clone())
            .collect();
        if !conflicting.is_empty() {
            return StoreError::Conflict {
                fields: conflicting,
            };
        }
        return StoreError::ValidationFailed {
            fields: field_errors.into_iter().map(|(field, _)| field).collect(),
            message,
        };
    }

    StoreError::RequestFailed { status, message }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn auth_statuses_are_forbidden() {
        let body = json!({"status": 403, "message": "Only superusers can perform this action."});
        assert!(matches!(classify_failure(403, &body), StoreError::Forbidden(_)));
        assert!(matches!(classify_failure(401, &Value::Null), StoreError::Forbidden(_)));
    }

    #[test]
    fn not_unique_codes_become_conflicts() {
        let body = json!({
            "status": 400,
            "message": "Failed to create record.",
            "data": {
                "name": {"code": "validation_not_unique", "message": "Value must be unique."},
                "tin": {"code": "validation_required", "message": "Cannot be blank."}
            }
        });
        assert_eq!(
            classify_failure(400, &body),
            StoreError::Conflict {
                fields: vec!["name".to_string()]
            }
        );
    }

    #[test]
    fn other_field_errors_are_validation_failures() {
        let body = json!({
            "message": "Failed to create record.",
            "data": {"status": {"code": "validation_invalid_value", "message": "Invalid value none."}}
        });
        match classify_failure(400, &body) {
            StoreError::ValidationFailed { fields, message } => {
                assert_eq!(fields, vec!["status".to_string()]);
                assert_eq!(message, "Failed to create record.");
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn remaining_statuses_are_request_failures() {
        let body = json!({"message": "Missing collection context."});
        assert_eq!(
            classify_failure(404, &body),
            StoreError::RequestFailed {
                status: 404,
                message: "Missing collection context.".to_string()
            }
        );
        assert!(matches!(
            classify_failure(400, &json!({"message": "bad", "data": {}})),
            StoreError::RequestFailed { status: 400, .. }
        ));
    }

    #[test]
    fn gateway_normalizes_base_url_and_token() {
        let gateway =
            PocketBaseGateway::new("http://127.0.0.1:8090/", Some(String::new())).expect("client");
        assert_eq!(gateway.base_url(), "http://127.0.0.1:8090");
        assert!(!gateway.has_token());
        assert_eq!(
            gateway.records_url("orders"),
            "http://127.0.0.1:8090/api/collections/orders/records"
        );
    }
}
