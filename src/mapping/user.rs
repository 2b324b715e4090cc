use super::wire::{UserDto, VendorDto};
use super::{
    extract_custom_fields, format_timestamp, parse_optional_timestamp, parse_timestamp, parse_url,
    to_domain_error, MappingMetrics, TypeMapper,
};
use crate::error::MappingError;
use crate::types::{Company, User};

const SYSTEM_PROPERTIES: &[&str] = &[
    "address",
    "avatar",
    "business_id",
    "business_phone",
    "business_phone_extension",
    "city",
    "company_permission_template_id",
    "country_code",
    "created_at",
    "default_permission_template_id",
    "email_address",
    "email_signature",
    "employee_id",
    "fax_number",
    "first_name",
    "id",
    "initials",
    "is_active",
    "is_employee",
    "is_insurance_manager",
    "job_title",
    "last_login_at",
    "last_name",
    "locale",
    "mobile_phone",
    "name",
    "notes",
    "origin_data",
    "origin_id",
    "state_code",
    "updated_at",
    "vendor",
    "work_classification_id",
    "zip",
];

/// Maps users from the v1.0 and v1.1 users endpoints.
#[derive(Debug, Default)]
pub struct UserMapper {
    metrics: MappingMetrics,
}

impl UserMapper {
    /// Create new user mapper.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TypeMapper for UserMapper {
    type Domain = User;
    type Wire = UserDto;

    const DOMAIN_TYPE: &'static str = "User";
    const WIRE_TYPE: &'static str = "UserDto";

    fn convert_to_domain(&self, wire: &UserDto) -> Result<User, MappingError> {
        let created_at = parse_timestamp(wire.created_at.as_deref())
            .map_err(|e| to_domain_error::<Self>("created_at", e))?;
        let updated_at = parse_timestamp(wire.updated_at.as_deref())
            .map_err(|e| to_domain_error::<Self>("updated_at", e))?;
        let last_sign_in_at = parse_optional_timestamp(wire.last_login_at.as_deref())
            .map_err(|e| to_domain_error::<Self>("last_login_at", e))?;
        let avatar_url = parse_url(wire.avatar.as_deref())
            .map_err(|e| to_domain_error::<Self>("avatar", e))?;

        let phone_number = wire
            .business_phone
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| wire.mobile_phone.clone().filter(|p| !p.is_empty()));

        let company = wire.vendor.as_ref().map(|vendor| Company {
            id: vendor.id.unwrap_or_default(),
            name: vendor.name.clone().unwrap_or_default(),
            is_active: true,
            ..Default::default()
        });

        Ok(User {
            id: wire.id.unwrap_or_default(),
            email: wire.email_address.clone().unwrap_or_default(),
            first_name: wire.first_name.clone().unwrap_or_default(),
            last_name: wire.last_name.clone().unwrap_or_default(),
            job_title: wire.job_title.clone(),
            is_active: wire.is_active.unwrap_or(true),
            created_at,
            updated_at,
            last_sign_in_at,
            avatar_url,
            phone_number,
            company,
            custom_fields: extract_custom_fields(&wire.extra, SYSTEM_PROPERTIES),
        })
    }

    fn convert_to_wire(&self, domain: &User) -> Result<UserDto, MappingError> {
        let address = domain.company.as_ref().and_then(|c| c.address.as_ref());

        Ok(UserDto {
            id: (domain.id != 0).then_some(domain.id),
            email_address: Some(domain.email.clone()),
            first_name: Some(domain.first_name.clone()),
            last_name: Some(domain.last_name.clone()),
            name: Some(domain.full_name()),
            job_title: domain.job_title.clone(),
            is_active: Some(domain.is_active),
            created_at: format_timestamp(&domain.created_at),
            updated_at: format_timestamp(&domain.updated_at),
            last_login_at: domain.last_sign_in_at.as_ref().map(|t| t.to_rfc3339()),
            avatar: domain.avatar_url.clone(),
            business_phone: domain.phone_number.clone(),
            mobile_phone: None,
            vendor: domain.company.as_ref().map(|c| VendorDto {
                id: Some(c.id),
                name: Some(c.name.clone()),
            }),
            address: address.and_then(|a| a.street1.clone()),
            city: address.and_then(|a| a.city.clone()),
            state_code: address.and_then(|a| a.state.clone()),
            country_code: address.and_then(|a| a.country.clone()),
            zip: address.and_then(|a| a.postal_code.clone()),
            extra: domain.custom_fields.clone().unwrap_or_default(),
        })
    }

    fn metrics(&self) -> &MappingMetrics {
        &self.metrics
    }
}
