use sha2::{Digest, Sha256};

use super::wire::{CustomFieldDefinitionDto, WorkforceCustomFieldDto};
use super::{MappingMetrics, TypeMapper};
use crate::error::MappingError;
use crate::types::{CreateCustomFieldRequest, CustomField};

const DEFAULT_FIELD_TYPE: &str = "string";
const DEFAULT_RESOURCE_TYPE: &str = "project";

/// Stable numeric id for a workforce planning field, whose ids are UUIDs.
///
/// First eight bytes of the SHA-256 digest, with the sign bit cleared.
pub fn custom_field_id_from_uuid(uuid: &str) -> i64 {
    let digest = Sha256::digest(uuid.trim().to_ascii_lowercase().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(bytes) & (i64::MAX as u64)) as i64
}

/// Maps custom field definitions.
///
/// Definitions do not carry the resource they apply to; the mapper stamps
/// `resource_type` on every field it produces.
#[derive(Debug)]
pub struct CustomFieldMapper {
    resource_type: String,
    metrics: MappingMetrics,
}

impl Default for CustomFieldMapper {
    fn default() -> Self {
        Self::new(DEFAULT_RESOURCE_TYPE)
    }
}

impl CustomFieldMapper {
    /// Create a mapper stamping `resource_type` on mapped fields.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            metrics: MappingMetrics::default(),
        }
    }

    /// Get the resource type.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Body for the workforce planning create endpoint.
    pub fn create_body(&self, request: &CreateCustomFieldRequest) -> WorkforceCustomFieldDto {
        let resource = request.resource_type.to_ascii_lowercase();
        let field_type = match request.field_type.trim().to_ascii_lowercase().as_str() {
            "string" | "text" => "text".to_string(),
            other => other.to_string(),
        };

        WorkforceCustomFieldDto {
            name: request.name.trim().to_string(),
            field_type,
            description: request.resource_type.clone(),
            values: request.allowed_values.clone(),
            on_projects: resource.contains("project"),
            on_people: resource.contains("user"),
        }
    }
}

impl TypeMapper for CustomFieldMapper {
    type Domain = CustomField;
    type Wire = CustomFieldDefinitionDto;

    const DOMAIN_TYPE: &'static str = "CustomField";
    const WIRE_TYPE: &'static str = "CustomFieldDefinitionDto";

    fn convert_to_domain(&self, wire: &CustomFieldDefinitionDto) -> Result<CustomField, MappingError> {
        Ok(CustomField {
            id: wire.id.unwrap_or_default(),
            name: wire.label.clone().unwrap_or_default(),
            field_type: wire
                .data_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_FIELD_TYPE.to_string()),
            resource_type: self.resource_type.clone(),
            is_required: false,
            default_value: wire.default_value.clone(),
            allowed_values: None,
            ..Default::default()
        })
    }

    fn convert_to_wire(&self, domain: &CustomField) -> Result<CustomFieldDefinitionDto, MappingError> {
        Ok(CustomFieldDefinitionDto {
            id: (domain.id != 0).then_some(domain.id),
            label: Some(domain.name.clone()),
            data_type: Some(domain.field_type.clone()),
            default_value: domain.default_value.clone(),
            extra: Default::default(),
        })
    }

    fn metrics(&self) -> &MappingMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_maps_definition() {
        let mapper = CustomFieldMapper::new("user");
        let wire: CustomFieldDefinitionDto = serde_json::from_value(json!({
            "id": 12,
            "label": "Badge Number",
            "data_type": "",
            "default_value": "N/A"
        }))
        .unwrap();

        let field = mapper.map_to_domain(&wire).unwrap();
        assert_eq!(field.id, 12);
        assert_eq!(field.name, "Badge Number");
        assert_eq!(field.field_type, "string");
        assert_eq!(field.resource_type, "user");
        assert!(!field.is_required);
        assert_eq!(field.default_value.as_deref(), Some("N/A"));
    }

    #[test]
    fn test_default_resource_type_is_project() {
        assert_eq!(CustomFieldMapper::default().resource_type(), "project");
    }

    #[test]
    fn test_create_body_targets() {
        let mapper = CustomFieldMapper::default();
        let body = mapper.create_body(&CreateCustomFieldRequest {
            name: " Crew Size ".to_string(),
            field_type: "string".to_string(),
            resource_type: "Project".to_string(),
            allowed_values: Some(vec!["small".to_string(), "large".to_string()]),
            ..Default::default()
        });

        assert_eq!(body.name, "Crew Size");
        assert_eq!(body.field_type, "text");
        assert_eq!(body.description, "Project");
        assert!(body.on_projects);
        assert!(!body.on_people);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["values"], json!(["small", "large"]));
    }

    #[test]
    fn test_uuid_ids_are_stable_and_positive() {
        let a = custom_field_id_from_uuid("6f1c8a9e-4b7d-4c3a-9e2f-0a1b2c3d4e5f");
        let b = custom_field_id_from_uuid("6F1C8A9E-4B7D-4C3A-9E2F-0A1B2C3D4E5F");
        let c = custom_field_id_from_uuid("00000000-0000-0000-0000-000000000001");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a >= 0 && c >= 0);
    }
}
