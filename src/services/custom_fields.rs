//! Custom field operations.

use chrono::Utc;
use tracing::debug;

use super::{require_id, require_text};
use crate::client::{Call, ProcoreClient, NO_QUERY};
use crate::error::{ApiError, ProcoreError, ProcoreResult};
use crate::mapping::wire::{CustomFieldDefinitionDto, WorkforceCustomFieldCreatedDto};
use crate::mapping::{custom_field_id_from_uuid, TypeMapper};
use crate::types::{CreateCustomFieldRequest, CustomField, UpdateCustomFieldRequest};

const RESOURCE: &str = "CustomField";
const DEFAULT_RESOURCE_TYPE: &str = "project";

/// Service for custom field operations.
pub struct CustomFieldsService<'a> {
    client: &'a ProcoreClient,
}

impl<'a> CustomFieldsService<'a> {
    /// Creates a new custom fields service.
    pub fn new(client: &'a ProcoreClient) -> Self {
        Self { client }
    }

    /// Lists the company's custom field definitions, tagged with
    /// `resource_type`.
    pub async fn list(&self, company_id: i64, resource_type: &str) -> ProcoreResult<Vec<CustomField>> {
        require_id("company_id", company_id)?;
        require_text("resource_type", resource_type)?;

        let definitions: Vec<CustomFieldDefinitionDto> = self
            .client
            .get(
                Call::new("custom_fields.list", RESOURCE).company(company_id),
                &format!("/rest/v1.1/companies/{}/custom_field_definitions", company_id),
                NO_QUERY,
            )
            .await?;

        let resource_type = resource_type.trim();
        let mut fields = self
            .client
            .mappers
            .custom_field
            .map_all_to_domain(&definitions)?;
        for field in &mut fields {
            field.resource_type = resource_type.to_string();
        }
        Ok(fields)
    }

    /// Gets a definition by id.
    pub async fn get(&self, company_id: i64, field_id: i64) -> ProcoreResult<CustomField> {
        require_id("field_id", field_id)?;

        self.list(company_id, DEFAULT_RESOURCE_TYPE)
            .await?
            .into_iter()
            .find(|f| f.id == field_id)
            .ok_or_else(|| {
                ApiError::ResourceNotFound {
                    resource_type: RESOURCE.to_string(),
                    id: field_id,
                    correlation_id: None,
                }
                .into()
            })
    }

    /// Creates a workforce planning custom field.
    ///
    /// The API returns a UUID; the field's numeric id is derived from it with
    /// [`custom_field_id_from_uuid`].
    pub async fn create(
        &self,
        company_id: i64,
        request: &CreateCustomFieldRequest,
    ) -> ProcoreResult<CustomField> {
        require_id("company_id", company_id)?;
        request.validate()?;

        let body = self.client.mappers.custom_field.create_body(request);
        let created: WorkforceCustomFieldCreatedDto = self
            .client
            .post(
                Call::new("custom_fields.create", RESOURCE).company(company_id),
                &format!(
                    "/rest/v1.0/workforce-planning/v2/companies/{}/custom-fields",
                    company_id
                ),
                &body,
            )
            .await?;

        let now = Utc::now();
        Ok(CustomField {
            id: created
                .id
                .as_deref()
                .map(custom_field_id_from_uuid)
                .unwrap_or_default(),
            name: request.name.trim().to_string(),
            field_type: request.field_type.clone(),
            resource_type: request.resource_type.clone(),
            is_required: request.is_required,
            default_value: request.default_value.clone(),
            allowed_values: request.allowed_values.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies `request` to the fetched definition. Definitions are not
    /// writable through the public API, so nothing is sent.
    pub async fn update(
        &self,
        company_id: i64,
        field_id: i64,
        request: &UpdateCustomFieldRequest,
    ) -> ProcoreResult<CustomField> {
        request.validate()?;
        let mut field = self.get(company_id, field_id).await?;

        if let Some(name) = &request.name {
            field.name = name.trim().to_string();
        }
        if let Some(is_required) = request.is_required {
            field.is_required = is_required;
        }
        if let Some(default_value) = &request.default_value {
            field.default_value = Some(default_value.clone());
        }
        if let Some(allowed_values) = &request.allowed_values {
            field.allowed_values = Some(allowed_values.clone());
        }
        field.updated_at = Utc::now();

        debug!(company_id, field_id, "Merged custom field update locally");
        Ok(field)
    }

    /// Custom field deletion is not available through the API.
    pub async fn delete(&self, company_id: i64, field_id: i64) -> ProcoreResult<()> {
        require_id("company_id", company_id)?;
        require_id("field_id", field_id)?;
        Err(ProcoreError::not_supported(
            "Custom field deletion",
            "Custom field deletion is not supported through the standard API. \
             Manage custom field definitions in the Procore admin tools.",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::client;
    use serde_json::{json, Value};

    fn definitions() -> Value {
        json!([
            {"id": 3, "label": "Crew Size", "data_type": "integer"},
            {"id": 4, "label": "Permit", "default_value": "pending"}
        ])
    }

    #[tokio::test]
    async fn test_list_tags_resource_type() {
        let (client, transport) = client();
        transport.queue_json_response(200, &definitions());

        let fields = client.custom_fields().list(6, "user").await.unwrap();
        assert_eq!(fields.len(), 2);
        assert!(fields.iter().all(|f| f.resource_type == "user"));
        assert_eq!(fields[1].field_type, "string");

        let sent = transport.get_last_request().unwrap();
        assert!(sent
            .url
            .ends_with("/rest/v1.1/companies/6/custom_field_definitions"));
    }

    #[tokio::test]
    async fn test_list_requires_resource_type() {
        let (client, transport) = client();
        assert!(client.custom_fields().list(6, "").await.is_err());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_get_defaults_to_project() {
        let (client, transport) = client();
        transport.queue_json_response(200, &definitions());
        transport.queue_json_response(200, &definitions());

        let field = client.custom_fields().get(6, 4).await.unwrap();
        assert_eq!(field.resource_type, "project");
        assert_eq!(field.default_value.as_deref(), Some("pending"));

        let err = client.custom_fields().get(6, 40).await.unwrap_err();
        assert_eq!(err.error_code(), "RESOURCE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_create_posts_workforce_field() {
        let (client, transport) = client();
        let uuid = "0f8fad5b-d9cb-469f-a165-70867728950e";
        transport.queue_json_response(201, &json!({"id": uuid}));

        let request = CreateCustomFieldRequest {
            name: "Certification".to_string(),
            field_type: "text".to_string(),
            resource_type: "user".to_string(),
            is_required: true,
            ..Default::default()
        };
        let field = client.custom_fields().create(6, &request).await.unwrap();
        assert_eq!(field.id, custom_field_id_from_uuid(uuid));
        assert!(field.is_required);

        let sent = transport.get_last_request().unwrap();
        assert!(sent
            .url
            .ends_with("/rest/v1.0/workforce-planning/v2/companies/6/custom-fields"));
        let body: Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["type"], "text");
        assert_eq!(body["on_people"], true);
        assert_eq!(body["on_projects"], false);
    }

    #[tokio::test]
    async fn test_update_merges_without_write() {
        let (client, transport) = client();
        transport.queue_json_response(200, &definitions());

        let request = UpdateCustomFieldRequest {
            name: Some("Crew Headcount".to_string()),
            is_required: Some(true),
            ..Default::default()
        };
        let field = client.custom_fields().update(6, 3, &request).await.unwrap();
        assert_eq!(field.name, "Crew Headcount");
        assert!(field.is_required);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_not_supported() {
        let (client, _) = client();
        let err = client.custom_fields().delete(6, 3).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_SUPPORTED");
    }
}
