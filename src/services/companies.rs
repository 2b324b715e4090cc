//! Company operations.

use chrono::Utc;
use tracing::debug;

use super::{require_id, require_text};
use crate::client::{Call, ProcoreClient, NO_QUERY};
use crate::error::{ApiError, ProcoreError, ProcoreResult};
use crate::mapping::wire::CompanyDto;
use crate::mapping::TypeMapper;
use crate::types::{
    Company, CreateCompanyRequest, PagedResult, PaginationOptions, UpdateCompanyRequest,
};

const RESOURCE: &str = "Company";
const COMPANIES_PATH: &str = "/rest/v1.0/companies";

/// Service for company operations.
pub struct CompaniesService<'a> {
    client: &'a ProcoreClient,
}

impl<'a> CompaniesService<'a> {
    /// Creates a new companies service.
    pub fn new(client: &'a ProcoreClient) -> Self {
        Self { client }
    }

    /// Lists the companies the caller can access.
    pub async fn list(&self) -> ProcoreResult<Vec<Company>> {
        let companies: Vec<CompanyDto> = self
            .client
            .get(Call::new("companies.list", RESOURCE), COMPANIES_PATH, NO_QUERY)
            .await?;
        self.client.mappers.company.map_all_to_domain(&companies)
    }

    /// Gets a company. The API has no single-company endpoint, so the list
    /// is searched.
    pub async fn get(&self, company_id: i64) -> ProcoreResult<Company> {
        require_id("company_id", company_id)?;

        self.list()
            .await?
            .into_iter()
            .find(|c| c.id == company_id)
            .ok_or_else(|| {
                ApiError::ResourceNotFound {
                    resource_type: RESOURCE.to_string(),
                    id: company_id,
                    correlation_id: None,
                }
                .into()
            })
    }

    /// Company provisioning is handled by Procore, not the public API.
    pub async fn create(&self, request: &CreateCompanyRequest) -> ProcoreResult<Company> {
        request.validate()?;
        Err(ProcoreError::not_supported(
            "Company creation",
            "Company creation is not supported through the standard API. \
             Contact Procore support for company provisioning.",
        ))
    }

    /// Applies `request` to the fetched company.
    ///
    /// Companies are read-only through the public API; the merged value is
    /// returned without a remote write.
    pub async fn update(
        &self,
        company_id: i64,
        request: &UpdateCompanyRequest,
    ) -> ProcoreResult<Company> {
        request.validate()?;
        let mut company = self.get(company_id).await?;

        if let Some(name) = &request.name {
            company.name = name.trim().to_string();
        }
        if let Some(description) = &request.description {
            company.description = Some(description.clone());
        }
        if let Some(is_active) = request.is_active {
            company.is_active = is_active;
        }
        if let Some(address) = &request.address {
            company.address = Some(address.clone());
        }
        if let Some(fields) = &request.custom_fields {
            company
                .custom_fields
                .get_or_insert_with(Default::default)
                .extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        company.updated_at = Utc::now();

        debug!(company_id, "Merged company update locally");
        Ok(company)
    }

    /// Company deletion is not available through the API.
    pub async fn delete(&self, company_id: i64) -> ProcoreResult<()> {
        require_id("company_id", company_id)?;
        Err(ProcoreError::not_supported(
            "Company deletion",
            "Company deletion is not supported through the standard API. \
             Contact Procore support for account management.",
        ))
    }

    /// Finds a company by exact name, ignoring case.
    pub async fn find_by_name(&self, name: &str) -> ProcoreResult<Option<Company>> {
        require_text("name", name)?;
        let name = name.trim();

        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    /// Lists one page of companies. Totals are estimated since the API
    /// returns no paging metadata.
    pub async fn list_paged(&self, options: &PaginationOptions) -> ProcoreResult<PagedResult<Company>> {
        options.validate()?;

        let mut query = options.query_pairs();
        query.push(("include_free_companies".to_string(), "true".to_string()));

        let companies: Vec<CompanyDto> = self
            .client
            .get(Call::new("companies.list_paged", RESOURCE), COMPANIES_PATH, &query)
            .await?;
        let items = self.client.mappers.company.map_all_to_domain(&companies)?;
        Ok(PagedResult::from_server_page(items, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::client;
    use serde_json::json;

    fn companies_body() -> serde_json::Value {
        json!([
            {"id": 1, "name": "Acme Builders", "is_active": true},
            {"id": 2, "name": "Beta Electric", "is_active": false, "trade": "electrical"}
        ])
    }

    #[tokio::test]
    async fn test_list_companies() {
        let (client, transport) = client();
        transport.queue_json_response(200, &companies_body());

        let companies = client.companies().list().await.unwrap();
        assert_eq!(companies.len(), 2);
        assert_eq!(companies[1].custom_fields.as_ref().unwrap()["trade"], "electrical");

        let sent = transport.get_last_request().unwrap();
        assert_eq!(sent.url, "https://api.procore.com/rest/v1.0/companies");
    }

    #[tokio::test]
    async fn test_get_filters_list() {
        let (client, transport) = client();
        transport.queue_json_response(200, &companies_body());
        transport.queue_json_response(200, &companies_body());

        let company = client.companies().get(2).await.unwrap();
        assert_eq!(company.name, "Beta Electric");

        let err = client.companies().get(3).await.unwrap_err();
        assert_eq!(err.error_code(), "RESOURCE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_rejects_non_positive_id() {
        let (client, transport) = client();
        let err = client.companies().get(0).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_REQUEST");
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_create_and_delete_not_supported() {
        let (client, _) = client();
        let request = CreateCompanyRequest {
            name: "New Co".to_string(),
            ..Default::default()
        };

        let err = client.companies().create(&request).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_SUPPORTED");
        assert!(err.to_string().contains("company provisioning"));

        let err = client.companies().delete(1).await.unwrap_err();
        assert!(err.to_string().contains("account management"));
    }

    #[tokio::test]
    async fn test_update_merges_locally() {
        let (client, transport) = client();
        transport.queue_json_response(200, &companies_body());

        let request = UpdateCompanyRequest {
            name: Some("Acme Builders West".to_string()),
            is_active: Some(false),
            ..Default::default()
        };
        let company = client.companies().update(1, &request).await.unwrap();

        assert_eq!(company.name, "Acme Builders West");
        assert!(!company.is_active);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_find_by_name_ignores_case() {
        let (client, transport) = client();
        transport.queue_json_response(200, &companies_body());
        transport.queue_json_response(200, &companies_body());

        let found = client.companies().find_by_name("acme builders").await.unwrap();
        assert_eq!(found.unwrap().id, 1);

        let missing = client.companies().find_by_name("Gamma").await.unwrap();
        assert!(missing.is_none());

        assert!(client.companies().find_by_name("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_list_paged_estimates_totals() {
        let (client, transport) = client();
        transport.queue_json_response(200, &companies_body());

        let options = PaginationOptions::new(3, 2);
        let page = client.companies().list_paged(&options).await.unwrap();

        assert_eq!(page.items.len(), 2);
        assert!(page.has_next_page);
        assert!(page.has_previous_page);
        assert_eq!(page.total_count, 7);
        assert_eq!(page.total_pages, 4);

        let sent = transport.get_last_request().unwrap();
        assert!(sent.url.contains("page=3"));
        assert!(sent.url.contains("per_page=2"));
        assert!(sent.url.contains("include_free_companies=true"));
    }
}
