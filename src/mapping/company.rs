use super::wire::CompanyDto;
use super::{extract_custom_fields, parse_url, to_domain_error, MappingMetrics, TypeMapper};
use crate::error::MappingError;
use crate::types::Company;

const SYSTEM_PROPERTIES: &[&str] = &[
    "id",
    "name",
    "is_active",
    "logo_url",
    "my_company",
    "pcn_business_experience",
];

/// Maps `GET /rest/v1.0/companies` items.
///
/// The list endpoint carries no description, address or timestamps; those
/// stay empty.
#[derive(Debug, Default)]
pub struct CompanyMapper {
    metrics: MappingMetrics,
}

impl CompanyMapper {
    /// Create new company mapper.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TypeMapper for CompanyMapper {
    type Domain = Company;
    type Wire = CompanyDto;

    const DOMAIN_TYPE: &'static str = "Company";
    const WIRE_TYPE: &'static str = "CompanyDto";

    fn convert_to_domain(&self, wire: &CompanyDto) -> Result<Company, MappingError> {
        let logo_url = parse_url(wire.logo_url.as_deref())
            .map_err(|e| to_domain_error::<Self>("logo_url", e))?;

        Ok(Company {
            id: wire.id.unwrap_or_default(),
            name: wire.name.clone().unwrap_or_default(),
            description: None,
            is_active: wire.is_active.unwrap_or(false),
            logo_url,
            custom_fields: extract_custom_fields(&wire.extra, SYSTEM_PROPERTIES),
            ..Default::default()
        })
    }

    fn convert_to_wire(&self, domain: &Company) -> Result<CompanyDto, MappingError> {
        Ok(CompanyDto {
            id: (domain.id != 0).then_some(domain.id),
            name: Some(domain.name.clone()),
            is_active: Some(domain.is_active),
            logo_url: domain.logo_url.clone(),
            my_company: None,
            pcn_business_experience: None,
            extra: domain.custom_fields.clone().unwrap_or_default(),
        })
    }

    fn metrics(&self) -> &MappingMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcoreError;
    use serde_json::json;

    fn dto(value: serde_json::Value) -> CompanyDto {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_maps_company_and_custom_fields() {
        let mapper = CompanyMapper::new();
        let company = mapper
            .map_to_domain(&dto(json!({
                "id": 8,
                "name": "Acme Builders",
                "is_active": true,
                "logo_url": "https://cdn.procore.com/acme.png",
                "my_company": true,
                "region": "west"
            })))
            .unwrap();

        assert_eq!(company.id, 8);
        assert_eq!(company.name, "Acme Builders");
        assert!(company.is_active);
        assert_eq!(company.logo_url.as_deref(), Some("https://cdn.procore.com/acme.png"));
        let custom = company.custom_fields.unwrap();
        assert_eq!(custom.len(), 1);
        assert_eq!(custom["region"], "west");
    }

    #[test]
    fn test_missing_fields_default() {
        let company = CompanyMapper::new().map_to_domain(&dto(json!({}))).unwrap();
        assert_eq!(company.id, 0);
        assert!(company.name.is_empty());
        assert!(!company.is_active);
        assert!(company.custom_fields.is_none());
    }

    #[test]
    fn test_invalid_logo_url_is_mapping_error() {
        let mapper = CompanyMapper::new();
        let err = mapper
            .map_to_domain(&dto(json!({"id": 1, "logo_url": "::bad::"})))
            .unwrap_err();

        match err {
            ProcoreError::Mapping(e) => {
                assert_eq!(e.source_type, "CompanyDto");
                assert_eq!(e.target_type, "Company");
                assert_eq!(e.property.as_deref(), Some("logo_url"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mapper.metrics().snapshot().to_domain_errors, 1);
        assert!(mapper.try_map_to_domain(&dto(json!({"logo_url": "::bad::"}))).is_none());
    }

    #[test]
    fn test_to_wire_carries_custom_fields() {
        let mapper = CompanyMapper::new();
        let source = dto(json!({"id": 3, "name": "Beta", "is_active": false, "region": "east"}));
        let company = mapper.map_to_domain(&source).unwrap();
        let wire = mapper.map_to_wire(&company).unwrap();

        assert_eq!(wire.id, Some(3));
        assert_eq!(wire.name.as_deref(), Some("Beta"));
        assert_eq!(wire.extra["region"], "east");
        assert_eq!(mapper.metrics().snapshot().to_wire_calls, 1);
    }
}
