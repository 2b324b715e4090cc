//! Request Types
//!
//! Inputs to create and update operations. Each request validates itself
//! before anything is sent.

use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::models::{Address, CustomFields};
use crate::error::{ProcoreError, ProcoreResult};

fn require(parameter: &str, value: &str) -> ProcoreResult<()> {
    if value.trim().is_empty() {
        return Err(ProcoreError::invalid_argument(
            parameter,
            format!("{} cannot be empty", parameter),
        ));
    }
    Ok(())
}

fn require_if_set(parameter: &str, value: Option<&String>) -> ProcoreResult<()> {
    match value {
        Some(v) => require(parameter, v),
        None => Ok(()),
    }
}

fn check_email(email: &str) -> ProcoreResult<()> {
    require("email", email)?;
    let valid = match email.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(ProcoreError::invalid_argument(
            "email",
            format!("'{}' is not a valid email address", email),
        ));
    }
    Ok(())
}

fn check_default_allowed(default: Option<&String>, allowed: Option<&Vec<String>>) -> ProcoreResult<()> {
    if let (Some(default), Some(allowed)) = (default, allowed) {
        if !allowed.is_empty() && !allowed.contains(default) {
            return Err(ProcoreError::invalid_argument(
                "default_value",
                format!("'{}' is not one of the allowed values", default),
            ));
        }
    }
    Ok(())
}

fn check_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> ProcoreResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ProcoreError::invalid_argument(
                "end_date",
                "end_date must not be before start_date",
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCompanyRequest {
    pub name: String,
    pub description: Option<String>,
    pub address: Option<Address>,
    pub custom_fields: Option<CustomFields>,
}

impl CreateCompanyRequest {
    /// Validate the request.
    pub fn validate(&self) -> ProcoreResult<()> {
        require("name", &self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCompanyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub address: Option<Address>,
    pub custom_fields: Option<CustomFields>,
}

impl UpdateCompanyRequest {
    /// Validate the request.
    pub fn validate(&self) -> ProcoreResult<()> {
        require_if_set("name", self.name.as_ref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub job_title: Option<String>,
    pub phone_number: Option<String>,
    pub custom_fields: Option<CustomFields>,
}

impl CreateUserRequest {
    /// Validate the request.
    pub fn validate(&self) -> ProcoreResult<()> {
        check_email(&self.email)?;
        require("first_name", &self.first_name)?;
        require("last_name", &self.last_name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub phone_number: Option<String>,
    pub is_active: Option<bool>,
    pub custom_fields: Option<CustomFields>,
}

impl UpdateUserRequest {
    /// Validate the request.
    pub fn validate(&self) -> ProcoreResult<()> {
        if let Some(email) = &self.email {
            check_email(email)?;
        }
        require_if_set("first_name", self.first_name.as_ref())?;
        require_if_set("last_name", self.last_name.as_ref())
    }
}

/// A file to upload.
#[derive(Debug, Clone, Default)]
pub struct UploadDocumentRequest {
    pub name: String,
    pub description: Option<String>,
    pub content: Bytes,
    pub file_name: String,
    pub content_type: String,
    pub is_private: bool,
    /// Folder to upload into; the company root when unset.
    pub parent_id: Option<i64>,
    pub custom_fields: Option<CustomFields>,
}

impl UploadDocumentRequest {
    /// Validate the request.
    pub fn validate(&self) -> ProcoreResult<()> {
        require("name", &self.name)?;
        require("file_name", &self.file_name)?;
        if self.content.is_empty() {
            return Err(ProcoreError::invalid_argument(
                "content",
                "File content cannot be empty",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDocumentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_private: Option<bool>,
    pub custom_fields: Option<CustomFields>,
}

impl UpdateDocumentRequest {
    /// Validate the request.
    pub fn validate(&self) -> ProcoreResult<()> {
        require_if_set("name", self.name.as_ref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCustomFieldRequest {
    pub name: String,
    pub field_type: String,
    pub resource_type: String,
    pub is_required: bool,
    pub default_value: Option<String>,
    pub allowed_values: Option<Vec<String>>,
}

impl CreateCustomFieldRequest {
    /// Validate the request.
    pub fn validate(&self) -> ProcoreResult<()> {
        require("name", &self.name)?;
        require("field_type", &self.field_type)?;
        require("resource_type", &self.resource_type)?;
        check_default_allowed(self.default_value.as_ref(), self.allowed_values.as_ref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCustomFieldRequest {
    pub name: Option<String>,
    pub is_required: Option<bool>,
    pub default_value: Option<String>,
    pub allowed_values: Option<Vec<String>>,
}

impl UpdateCustomFieldRequest {
    /// Validate the request.
    pub fn validate(&self) -> ProcoreResult<()> {
        require_if_set("name", self.name.as_ref())?;
        check_default_allowed(self.default_value.as_ref(), self.allowed_values.as_ref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub project_number: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl CreateProjectRequest {
    /// Validate the request.
    pub fn validate(&self) -> ProcoreResult<()> {
        require("name", &self.name)?;
        check_dates(self.start_date, self.end_date)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub project_number: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

impl UpdateProjectRequest {
    /// Validate the request.
    pub fn validate(&self) -> ProcoreResult<()> {
        require_if_set("name", self.name.as_ref())?;
        check_dates(self.start_date, self.end_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_company_requires_name() {
        assert!(CreateCompanyRequest::default().validate().is_err());
        let request = CreateCompanyRequest {
            name: "Acme Builders".to_string(),
            ..Default::default()
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_update_rejects_blank_name_only_when_set() {
        assert!(UpdateCompanyRequest::default().validate().is_ok());
        let request = UpdateCompanyRequest {
            name: Some("  ".to_string()),
            ..Default::default()
        };
        let err = request.validate().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_REQUEST");
    }

    #[test]
    fn test_user_email_validation() {
        let mut request = CreateUserRequest {
            email: "jane@example.com".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            ..Default::default()
        };
        assert!(request.validate().is_ok());

        for bad in ["", "jane", "@example.com", "jane@localhost", "jane@.com"] {
            request.email = bad.to_string();
            assert!(request.validate().is_err(), "accepted {bad:?}");
        }

        let update = UpdateUserRequest {
            email: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_upload_requires_content() {
        let mut request = UploadDocumentRequest {
            name: "Plans".to_string(),
            file_name: "plans.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            ..Default::default()
        };
        assert!(request.validate().is_err());

        request.content = Bytes::from_static(b"%PDF-1.7");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_custom_field_default_must_be_allowed() {
        let request = CreateCustomFieldRequest {
            name: "Trade".to_string(),
            field_type: "lov_entry".to_string(),
            resource_type: "project".to_string(),
            default_value: Some("Plumbing".to_string()),
            allowed_values: Some(vec!["Electrical".to_string(), "Concrete".to_string()]),
            ..Default::default()
        };
        assert!(request.validate().is_err());

        let update = UpdateCustomFieldRequest {
            default_value: Some("Concrete".to_string()),
            allowed_values: Some(vec!["Concrete".to_string()]),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
    }

    #[test]
    fn test_project_dates() {
        let request = CreateProjectRequest {
            name: "Tower".to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            ..Default::default()
        };
        assert!(request.validate().is_err());
    }
}
