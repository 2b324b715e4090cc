//! User operations.

use super::{require_id, require_text};
use crate::client::{Call, ProcoreClient, NO_QUERY};
use crate::error::ProcoreResult;
use crate::mapping::wire::{CurrentUserDto, UserDto, UserEnvelope, UserWriteDto};
use crate::mapping::TypeMapper;
use crate::types::{CreateUserRequest, PagedResult, PaginationOptions, UpdateUserRequest, User};

const RESOURCE: &str = "User";

/// Service for user operations.
pub struct UsersService<'a> {
    client: &'a ProcoreClient,
}

impl<'a> UsersService<'a> {
    /// Creates a new users service.
    pub fn new(client: &'a ProcoreClient) -> Self {
        Self { client }
    }

    /// Lists the users of a company.
    pub async fn list(&self, company_id: i64) -> ProcoreResult<Vec<User>> {
        require_id("company_id", company_id)?;

        let users: Vec<UserDto> = self
            .client
            .get(
                Call::new("users.list", RESOURCE).company(company_id),
                &format!("/rest/v1.1/companies/{}/users", company_id),
                NO_QUERY,
            )
            .await?;
        self.client.mappers.user.map_all_to_domain(&users)
    }

    /// Gets a user.
    pub async fn get(&self, company_id: i64, user_id: i64) -> ProcoreResult<User> {
        require_id("company_id", company_id)?;
        require_id("user_id", user_id)?;

        let user: UserDto = self
            .client
            .get(
                Call::new("users.get", RESOURCE).company(company_id),
                &format!("/rest/v1.0/users/{}", user_id),
                &[("company_id", company_id)],
            )
            .await?;
        self.client.mappers.user.map_to_domain(&user)
    }

    /// Creates a user in a company directory.
    pub async fn create(&self, company_id: i64, request: &CreateUserRequest) -> ProcoreResult<User> {
        require_id("company_id", company_id)?;
        request.validate()?;

        let body = UserEnvelope {
            user: UserWriteDto {
                email_address: Some(request.email.trim().to_string()),
                first_name: Some(request.first_name.trim().to_string()),
                last_name: Some(request.last_name.trim().to_string()),
                job_title: request.job_title.clone(),
                business_phone: request.phone_number.clone(),
                is_active: None,
                extra: request.custom_fields.clone().unwrap_or_default(),
            },
        };

        let user: UserDto = self
            .client
            .post(
                Call::new("users.create", RESOURCE).company(company_id),
                &format!("/rest/v1.1/companies/{}/users", company_id),
                &body,
            )
            .await?;
        self.client.mappers.user.map_to_domain(&user)
    }

    /// Updates a user. Unset fields are left unchanged.
    pub async fn update(
        &self,
        company_id: i64,
        user_id: i64,
        request: &UpdateUserRequest,
    ) -> ProcoreResult<User> {
        require_id("company_id", company_id)?;
        require_id("user_id", user_id)?;
        request.validate()?;

        let body = UserEnvelope {
            user: UserWriteDto {
                email_address: request.email.as_ref().map(|e| e.trim().to_string()),
                first_name: request.first_name.clone(),
                last_name: request.last_name.clone(),
                job_title: request.job_title.clone(),
                business_phone: request.phone_number.clone(),
                is_active: request.is_active,
                extra: request.custom_fields.clone().unwrap_or_default(),
            },
        };
        self.patch(company_id, user_id, "users.update", &body).await
    }

    /// Deactivates a user.
    pub async fn deactivate(&self, company_id: i64, user_id: i64) -> ProcoreResult<User> {
        require_id("company_id", company_id)?;
        require_id("user_id", user_id)?;

        let body = UserEnvelope {
            user: UserWriteDto {
                is_active: Some(false),
                ..Default::default()
            },
        };
        self.patch(company_id, user_id, "users.deactivate", &body).await
    }

    /// Users whose first name, last name, email or job title contains
    /// `term`, ignoring case.
    pub async fn search(&self, company_id: i64, term: &str) -> ProcoreResult<Vec<User>> {
        require_text("term", term)?;
        let term = term.trim().to_lowercase();
        let matches = |value: &str| value.to_lowercase().contains(&term);

        Ok(self
            .list(company_id)
            .await?
            .into_iter()
            .filter(|u| {
                matches(&u.first_name)
                    || matches(&u.last_name)
                    || matches(&u.email)
                    || u.job_title.as_deref().is_some_and(matches)
            })
            .collect())
    }

    /// Lists one page of users.
    pub async fn list_paged(
        &self,
        company_id: i64,
        options: &PaginationOptions,
    ) -> ProcoreResult<PagedResult<User>> {
        options.validate()?;
        let users = self.list(company_id).await?;
        Ok(PagedResult::from_all(users, options))
    }

    /// The authenticated user.
    pub async fn current(&self) -> ProcoreResult<User> {
        let me: CurrentUserDto = self
            .client
            .get(Call::new("users.current", RESOURCE), "/rest/v1.0/me", NO_QUERY)
            .await?;
        self.client.mappers.user.map_to_domain(&UserDto::from(me))
    }

    async fn patch(
        &self,
        company_id: i64,
        user_id: i64,
        operation: &str,
        body: &UserEnvelope<UserWriteDto>,
    ) -> ProcoreResult<User> {
        let user: UserDto = self
            .client
            .patch(
                Call::new(operation, RESOURCE).company(company_id),
                &format!("/rest/v1.1/companies/{}/users/{}", company_id, user_id),
                body,
            )
            .await?;
        self.client.mappers.user.map_to_domain(&user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HttpMethod;
    use crate::services::test_support::client;
    use serde_json::{json, Value};

    fn users_body() -> Value {
        json!([
            {"id": 1, "email_address": "ana@example.com", "first_name": "Ana", "last_name": "Ruiz", "job_title": "Foreman"},
            {"id": 2, "email_address": "bo@example.com", "first_name": "Bo", "last_name": "Chen"},
            {"id": 3, "email_address": "cy@example.com", "first_name": "Cy", "last_name": "Park", "job_title": "Project Engineer"}
        ])
    }

    #[tokio::test]
    async fn test_list_users() {
        let (client, transport) = client();
        transport.queue_json_response(200, &users_body());

        let users = client.users().list(8).await.unwrap();
        assert_eq!(users.len(), 3);
        assert_eq!(users[0].full_name(), "Ana Ruiz");

        let sent = transport.get_last_request().unwrap();
        assert_eq!(sent.url, "https://api.procore.com/rest/v1.1/companies/8/users");
        assert_eq!(sent.get_header("Procore-Company-Id"), Some("8"));
    }

    #[tokio::test]
    async fn test_get_user_passes_company_id() {
        let (client, transport) = client();
        transport.queue_json_response(200, &json!({"id": 5, "email_address": "e@example.com"}));

        let user = client.users().get(8, 5).await.unwrap();
        assert_eq!(user.id, 5);

        let sent = transport.get_last_request().unwrap();
        assert_eq!(sent.url, "https://api.procore.com/rest/v1.0/users/5?company_id=8");
    }

    #[tokio::test]
    async fn test_create_wraps_user() {
        let (client, transport) = client();
        transport.queue_json_response(201, &json!({"id": 9, "email_address": "new@example.com"}));

        let request = CreateUserRequest {
            email: "new@example.com".to_string(),
            first_name: "New".to_string(),
            last_name: "Hire".to_string(),
            ..Default::default()
        };
        let user = client.users().create(8, &request).await.unwrap();
        assert_eq!(user.id, 9);

        let sent = transport.get_last_request().unwrap();
        assert_eq!(sent.method, HttpMethod::Post);
        let body: Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["user"]["email_address"], "new@example.com");
        assert!(body["user"].get("is_active").is_none());
    }

    #[tokio::test]
    async fn test_create_validates_before_sending() {
        let (client, transport) = client();
        let request = CreateUserRequest {
            email: "not-an-email".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            ..Default::default()
        };

        let err = client.users().create(8, &request).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_REQUEST");
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_deactivate_patches_is_active() {
        let (client, transport) = client();
        transport.queue_json_response(200, &json!({"id": 2, "is_active": false}));

        let user = client.users().deactivate(8, 2).await.unwrap();
        assert!(!user.is_active);

        let sent = transport.get_last_request().unwrap();
        assert_eq!(sent.method, HttpMethod::Patch);
        assert!(sent.url.ends_with("/rest/v1.1/companies/8/users/2"));
        let body: Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"user": {"is_active": false}}));
    }

    #[tokio::test]
    async fn test_search_matches_fields() {
        let (client, transport) = client();
        transport.set_default_response(crate::core::HttpResponse::new(200, users_body().to_string()));

        let by_title = client.users().search(8, "ENGINEER").await.unwrap();
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].id, 3);

        let by_email = client.users().search(8, "@example.com").await.unwrap();
        assert_eq!(by_email.len(), 3);

        assert!(client.users().search(8, "").await.is_err());
    }

    #[tokio::test]
    async fn test_list_paged_slices() {
        let (client, transport) = client();
        transport.queue_json_response(200, &users_body());

        let page = client
            .users()
            .list_paged(8, &PaginationOptions::new(2, 2))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, 3);
        assert_eq!(page.total_count, 3);
        assert!(!page.has_next_page);
    }

    #[tokio::test]
    async fn test_current_user() {
        let (client, transport) = client();
        transport.queue_json_response(200, &json!({"id": 77, "login": "me@example.com", "name": "Jo Smith"}));

        let me = client.users().current().await.unwrap();
        assert_eq!(me.id, 77);
        assert_eq!(me.email, "me@example.com");
        assert_eq!(me.first_name, "Jo");
        assert_eq!(me.last_name, "Smith");
    }
}
