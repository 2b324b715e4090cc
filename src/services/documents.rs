//! Document operations.

use super::{require_id, require_text};
use crate::client::{Call, ProcoreClient, NO_QUERY};
use crate::core::{FileUpload, MultipartForm};
use crate::error::ProcoreResult;
use crate::mapping::wire::{FileDto, FileEnvelope, FileWriteDto, FolderDto};
use crate::mapping::TypeMapper;
use crate::types::{
    Document, PagedResult, PaginationOptions, UpdateDocumentRequest, UploadDocumentRequest,
};

const RESOURCE: &str = "Document";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Service for document operations.
pub struct DocumentsService<'a> {
    client: &'a ProcoreClient,
}

impl<'a> DocumentsService<'a> {
    /// Creates a new documents service.
    pub fn new(client: &'a ProcoreClient) -> Self {
        Self { client }
    }

    /// Lists the files in a company's document root.
    pub async fn list(&self, company_id: i64) -> ProcoreResult<Vec<Document>> {
        require_id("company_id", company_id)?;

        let folder: FolderDto = self
            .client
            .get(
                Call::new("documents.list", RESOURCE).company(company_id),
                &format!("/rest/v1.0/companies/{}/folders", company_id),
                &[("exclude_folders", "true")],
            )
            .await?;
        self.client.mappers.document.map_all_to_domain(&folder.files)
    }

    /// Gets a file.
    pub async fn get(&self, company_id: i64, document_id: i64) -> ProcoreResult<Document> {
        require_id("company_id", company_id)?;
        require_id("document_id", document_id)?;

        let file: FileDto = self
            .client
            .get(
                Call::new("documents.get", RESOURCE).company(company_id),
                &self.file_path(company_id, document_id),
                NO_QUERY,
            )
            .await?;
        self.client.mappers.document.map_to_domain(&file)
    }

    /// Uploads a file as multipart form data with the long-running timeout.
    pub async fn upload(
        &self,
        company_id: i64,
        request: &UploadDocumentRequest,
    ) -> ProcoreResult<Document> {
        require_id("company_id", company_id)?;
        request.validate()?;

        let content_type = if request.content_type.trim().is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            request.content_type.trim()
        };

        let mut form = MultipartForm::new()
            .field("file[name]", request.name.trim())
            .field("file[is_tracked]", "false")
            .field("file[private]", request.is_private.to_string());
        if let Some(description) = &request.description {
            form = form.field("file[description]", description.clone());
        }
        if let Some(parent_id) = request.parent_id {
            form = form.field("file[parent_id]", parent_id.to_string());
        }
        if let Some(fields) = &request.custom_fields {
            for (key, value) in fields {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                form = form.field(format!("file[custom_fields][{}]", key), value);
            }
        }
        let form = form.file(FileUpload::new(
            "file[data]",
            request.file_name.trim(),
            request.content.clone(),
            content_type,
        ));

        let file: FileDto = self
            .client
            .post_multipart(
                Call::new("documents.upload", RESOURCE).company(company_id),
                &format!("/rest/v1.0/companies/{}/files", company_id),
                form,
            )
            .await?;
        self.client.mappers.document.map_to_domain(&file)
    }

    /// Updates a file's metadata.
    pub async fn update(
        &self,
        company_id: i64,
        document_id: i64,
        request: &UpdateDocumentRequest,
    ) -> ProcoreResult<Document> {
        require_id("company_id", company_id)?;
        require_id("document_id", document_id)?;
        request.validate()?;

        let body = FileEnvelope {
            file: FileWriteDto {
                name: request.name.as_ref().map(|n| n.trim().to_string()),
                description: request.description.clone(),
                private: request.is_private,
                extra: request.custom_fields.clone().unwrap_or_default(),
            },
        };

        let file: FileDto = self
            .client
            .patch(
                Call::new("documents.update", RESOURCE).company(company_id),
                &self.file_path(company_id, document_id),
                &body,
            )
            .await?;
        self.client.mappers.document.map_to_domain(&file)
    }

    /// Deletes a file.
    pub async fn delete(&self, company_id: i64, document_id: i64) -> ProcoreResult<()> {
        require_id("company_id", company_id)?;
        require_id("document_id", document_id)?;

        self.client
            .delete(
                Call::new("documents.delete", RESOURCE).company(company_id),
                &self.file_path(company_id, document_id),
            )
            .await
    }

    /// Files whose content type equals `document_type` or whose name ends
    /// in `.{document_type}`, ignoring case.
    pub async fn list_by_type(
        &self,
        company_id: i64,
        document_type: &str,
    ) -> ProcoreResult<Vec<Document>> {
        require_text("document_type", document_type)?;
        let document_type = document_type.trim().to_lowercase();
        let extension = format!(".{}", document_type);

        Ok(self
            .list(company_id)
            .await?
            .into_iter()
            .filter(|d| {
                d.content_type.to_lowercase() == document_type
                    || d.file_name.to_lowercase().ends_with(&extension)
            })
            .collect())
    }

    /// Lists one page of files.
    pub async fn list_paged(
        &self,
        company_id: i64,
        options: &PaginationOptions,
    ) -> ProcoreResult<PagedResult<Document>> {
        options.validate()?;
        let documents = self.list(company_id).await?;
        Ok(PagedResult::from_all(documents, options))
    }

    fn file_path(&self, company_id: i64, document_id: i64) -> String {
        format!("/rest/v1.0/companies/{}/files/{}", company_id, document_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{HttpMethod, HttpResponse};
    use crate::services::test_support::client;
    use bytes::Bytes;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn folder_body() -> Value {
        json!({
            "id": 1,
            "name": "Root",
            "files": [
                {"id": 10, "name": "plan.PDF", "file_type": "application/pdf", "size": 100},
                {"id": 11, "name": "photo.jpg", "file_type": "image/jpeg", "size": 200},
                {"id": 12, "name": "specs.txt", "size": 10}
            ]
        })
    }

    #[tokio::test]
    async fn test_list_reads_files_from_folder() {
        let (client, transport) = client();
        transport.queue_json_response(200, &folder_body());

        let docs = client.documents().list(4).await.unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[2].content_type, "application/octet-stream");

        let sent = transport.get_last_request().unwrap();
        assert_eq!(
            sent.url,
            "https://api.procore.com/rest/v1.0/companies/4/folders?exclude_folders=true"
        );
    }

    #[tokio::test]
    async fn test_list_by_type_matches_mime_or_extension() {
        let (client, transport) = client();
        transport.set_default_response(HttpResponse::new(200, folder_body().to_string()));

        let pdfs = client.documents().list_by_type(4, "pdf").await.unwrap();
        assert_eq!(pdfs.len(), 1);
        assert_eq!(pdfs[0].id, 10);

        let jpegs = client.documents().list_by_type(4, "IMAGE/JPEG").await.unwrap();
        assert_eq!(jpegs.len(), 1);
        assert_eq!(jpegs[0].id, 11);

        assert!(client.documents().list_by_type(4, " ").await.is_err());
    }

    #[tokio::test]
    async fn test_upload_builds_multipart() {
        let (client, transport) = client();
        transport.queue_json_response(201, &json!({"id": 30, "name": "site.png", "file_type": "image/png"}));

        let request = UploadDocumentRequest {
            name: "site.png".to_string(),
            description: Some("Aerial".to_string()),
            content: Bytes::from_static(b"\x89PNG"),
            file_name: "site.png".to_string(),
            content_type: "image/png".to_string(),
            parent_id: Some(5),
            ..Default::default()
        };
        let doc = client.documents().upload(4, &request).await.unwrap();
        assert_eq!(doc.id, 30);

        let sent = transport.get_last_request().unwrap();
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.timeout, Some(Duration::from_secs(300)));

        let form = sent.multipart.unwrap();
        assert!(form.fields.contains(&("file[name]".to_string(), "site.png".to_string())));
        assert!(form.fields.contains(&("file[parent_id]".to_string(), "5".to_string())));
        assert_eq!(form.files.len(), 1);
        assert_eq!(form.files[0].field_name, "file[data]");
        assert_eq!(form.files[0].mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_content() {
        let (client, transport) = client();
        let request = UploadDocumentRequest {
            name: "empty".to_string(),
            file_name: "empty.txt".to_string(),
            ..Default::default()
        };

        assert!(client.documents().upload(4, &request).await.is_err());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (client, transport) = client();
        transport.queue_json_response(200, &json!({"id": 10, "name": "renamed.pdf", "private": true}));
        transport.queue_response(HttpResponse::new(204, ""));

        let request = UpdateDocumentRequest {
            name: Some("renamed.pdf".to_string()),
            is_private: Some(true),
            ..Default::default()
        };
        let doc = client.documents().update(4, 10, &request).await.unwrap();
        assert!(doc.is_private);

        let patch = transport.get_last_request().unwrap();
        let body: Value = serde_json::from_str(patch.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"file": {"name": "renamed.pdf", "private": true}}));

        client.documents().delete(4, 10).await.unwrap();
        let delete = transport.get_last_request().unwrap();
        assert_eq!(delete.method, HttpMethod::Delete);
        assert!(delete.url.ends_with("/rest/v1.0/companies/4/files/10"));
    }

    #[tokio::test]
    async fn test_get_missing_document() {
        let (client, transport) = client();
        transport.queue_response(HttpResponse::new(404, "{}"));

        let err = client.documents().get(4, 99).await.unwrap_err();
        assert_eq!(err.error_code(), "RESOURCE_NOT_FOUND");
        assert!(err.to_string().contains("Document with ID 99"));
    }
}
