//! Type Mapping
//!
//! Conversion between Procore wire types and the SDK's domain models, with
//! per-mapper timing and failure metrics.

mod company;
mod custom_field;
mod document;
mod metrics;
mod project;
mod user;
pub mod wire;

pub use company::CompanyMapper;
pub use custom_field::{custom_field_id_from_uuid, CustomFieldMapper};
pub use document::DocumentMapper;
pub use metrics::{MappingMetrics, MappingMetricsSnapshot};
pub use project::ProjectMapper;
pub use user::UserMapper;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

use crate::error::{MappingError, ProcoreResult};
use crate::types::CustomFields;

/// Maps one wire type to one domain type and back.
///
/// Implementors provide the raw conversions; the provided methods time
/// them and record the outcome in [`TypeMapper::metrics`].
pub trait TypeMapper: Send + Sync {
    type Domain;
    type Wire;

    const DOMAIN_TYPE: &'static str;
    const WIRE_TYPE: &'static str;

    fn convert_to_domain(&self, wire: &Self::Wire) -> Result<Self::Domain, MappingError>;

    fn convert_to_wire(&self, domain: &Self::Domain) -> Result<Self::Wire, MappingError>;

    fn metrics(&self) -> &MappingMetrics;

    fn map_to_domain(&self, wire: &Self::Wire) -> ProcoreResult<Self::Domain> {
        let start = Instant::now();
        let result = self.convert_to_domain(wire);
        self.metrics()
            .record_to_domain(start.elapsed(), result.is_ok());
        result.map_err(Into::into)
    }

    fn map_to_wire(&self, domain: &Self::Domain) -> ProcoreResult<Self::Wire> {
        let start = Instant::now();
        let result = self.convert_to_wire(domain);
        self.metrics().record_to_wire(start.elapsed(), result.is_ok());
        result.map_err(Into::into)
    }

    fn try_map_to_domain(&self, wire: &Self::Wire) -> Option<Self::Domain> {
        self.map_to_domain(wire).ok()
    }

    fn try_map_to_wire(&self, domain: &Self::Domain) -> Option<Self::Wire> {
        self.map_to_wire(domain).ok()
    }

    fn map_all_to_domain(&self, wires: &[Self::Wire]) -> ProcoreResult<Vec<Self::Domain>> {
        wires.iter().map(|w| self.map_to_domain(w)).collect()
    }
}

/// Error builder for mapper `M`, wire to domain.
pub(crate) fn to_domain_error<M: TypeMapper>(property: &str, message: impl Into<String>) -> MappingError {
    MappingError::new(M::WIRE_TYPE, M::DOMAIN_TYPE, message).with_property(property)
}

/// Parse an RFC 3339 timestamp or a bare date. Missing or empty values
/// become the Unix epoch.
pub(crate) fn parse_timestamp(value: Option<&str>) -> Result<DateTime<Utc>, String> {
    Ok(parse_optional_timestamp(value)?.unwrap_or_default())
}

pub(crate) fn parse_optional_timestamp(value: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    let value = match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => return Ok(None),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Some(dt.and_utc()));
        }
    }
    Err(format!("'{}' is not a valid timestamp", value))
}

pub(crate) fn parse_optional_date(value: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => match NaiveDate::parse_from_str(v, "%Y-%m-%d") {
            Ok(date) => Ok(Some(date)),
            Err(_) => parse_optional_timestamp(Some(v)).map(|dt| dt.map(|dt| dt.date_naive())),
        },
        _ => Ok(None),
    }
}

/// `None` for the epoch placeholder, RFC 3339 otherwise.
pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> Option<String> {
    (*value != DateTime::<Utc>::default()).then(|| value.to_rfc3339())
}

/// Validate an absolute URL; empty values are treated as absent.
pub(crate) fn parse_url(value: Option<&str>) -> Result<Option<String>, String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => url::Url::parse(v)
            .map(|u| Some(u.to_string()))
            .map_err(|e| format!("'{}' is not a valid URL: {}", v, e)),
        _ => Ok(None),
    }
}

/// Unknown wire attributes, minus the API's own system properties.
pub(crate) fn extract_custom_fields(
    extra: &HashMap<String, Value>,
    system_properties: &[&str],
) -> Option<CustomFields> {
    let fields: CustomFields = extra
        .iter()
        .filter(|(k, _)| !system_properties.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    (!fields.is_empty()).then_some(fields)
}
