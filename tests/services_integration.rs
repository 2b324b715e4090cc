//! End-to-end service calls against a mock Procore API.

mod common;

use bytes::Bytes;
use common::*;
use procore_sdk::{
    ApiError, CreateProjectRequest, PaginationOptions, ProcoreError, UploadDocumentRequest,
    COMPANY_ID_HEADER,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_list_projects_sends_auth_and_company_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1.0/companies/42/projects"))
        .and(header("authorization", "Bearer abc"))
        .and(header(COMPANY_ID_HEADER, "42"))
        .and(header("accept", "application/json"))
        .and(header_exists("x-correlation-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 7,
                "name": "Riverside Clinic",
                "active": true,
                "start_date": "2026-03-01",
                "project_stage": {"id": 2, "name": "Course of Construction"},
                "company": {"id": 42, "name": "Acme"}
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = authenticated_client(&server).await;
    let projects = client.projects().list(42).await.unwrap();

    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].name, "Riverside Clinic");
    assert_eq!(projects[0].status.as_deref(), Some("Course of Construction"));
    assert_eq!(projects[0].company_id, 42);
}

#[tokio::test]
async fn test_paged_projects_pass_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1.0/companies/42/projects"))
        .and(query_param("page", "2"))
        .and(query_param("per_page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 3, "name": "C"},
            {"id": 4, "name": "D"}
        ])))
        .mount(&server)
        .await;

    let client = authenticated_client(&server).await;
    let page = client
        .projects()
        .list_paged(42, &PaginationOptions::new(2, 2))
        .await
        .unwrap();

    assert_eq!(page.items.len(), 2);
    assert!(page.has_next_page);
    assert!(page.has_previous_page);
}

#[tokio::test]
async fn test_create_project_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1.0/projects"))
        .and(body_json(json!({
            "company_id": 42,
            "project": {"name": "Depot Retrofit", "project_number": "P-9", "active": true}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 900,
            "name": "Depot Retrofit",
            "project_number": "P-9",
            "active": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = authenticated_client(&server).await;
    let request = CreateProjectRequest {
        name: "  Depot Retrofit ".to_string(),
        project_number: Some("P-9".to_string()),
        ..Default::default()
    };
    let project = client.projects().create(42, &request).await.unwrap();
    assert_eq!(project.id, 900);
    assert_eq!(project.company_id, 42);
}

#[tokio::test]
async fn test_missing_user_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1.0/users/404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not found"})))
        .mount(&server)
        .await;

    let client = authenticated_client(&server).await;
    let err = client.users().get(42, 404).await.unwrap_err();

    match &err {
        ProcoreError::Api(ApiError::ResourceNotFound {
            resource_type,
            id,
            correlation_id,
        }) => {
            assert_eq!(resource_type, "User");
            assert_eq!(*id, 404);
            assert!(correlation_id.is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_validation_errors_are_collected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1.1/companies/42/users"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Validation failed",
            "errors": {"email_address": ["has already been taken"]}
        })))
        .mount(&server)
        .await;

    let client = authenticated_client(&server).await;
    let request = procore_sdk::CreateUserRequest {
        email: "dup@example.com".to_string(),
        first_name: "Dee".to_string(),
        last_name: "Up".to_string(),
        ..Default::default()
    };
    let err = client.users().create(42, &request).await.unwrap_err();

    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    match err {
        ProcoreError::Api(ApiError::Validation { errors, .. }) => {
            let errors = errors.unwrap();
            assert_eq!(errors["email_address"], vec!["has already been taken".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_document_upload_is_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1.0/companies/42/files"))
        .and(body_string_contains("filename=\"notes.txt\""))
        .and(body_string_contains("field notes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 55,
            "name": "notes.txt",
            "file_type": "text/plain",
            "size": 11
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = authenticated_client(&server).await;
    let request = UploadDocumentRequest {
        name: "notes.txt".to_string(),
        content: Bytes::from_static(b"field notes"),
        file_name: "notes.txt".to_string(),
        content_type: "text/plain".to_string(),
        ..Default::default()
    };
    let document = client.documents().upload(42, &request).await.unwrap();

    assert_eq!(document.id, 55);
    assert_eq!(document.file_size, 11);
}

#[tokio::test]
async fn test_current_user_and_mapping_metrics() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1.0/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "login": "pm@example.com",
            "name": "Pat Morgan"
        })))
        .mount(&server)
        .await;

    let client = authenticated_client(&server).await;
    let me = client.users().current().await.unwrap();
    assert_eq!(me.full_name(), "Pat Morgan");

    let metrics = client.mapping_metrics();
    assert_eq!(metrics["User"].to_domain_calls, 1);
    assert_eq!(metrics["Project"].to_domain_calls, 0);
}
