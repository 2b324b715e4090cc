//! Project operations.

use super::{require_id, require_text};
use crate::client::{Call, ProcoreClient, NO_QUERY};
use crate::error::ProcoreResult;
use crate::mapping::wire::{ProjectDto, ProjectEnvelope, ProjectWriteDto};
use crate::mapping::TypeMapper;
use crate::types::{
    CreateProjectRequest, PagedResult, PaginationOptions, Project, UpdateProjectRequest,
};

const RESOURCE: &str = "Project";

/// Service for project operations.
pub struct ProjectsService<'a> {
    client: &'a ProcoreClient,
}

impl<'a> ProjectsService<'a> {
    /// Creates a new projects service.
    pub fn new(client: &'a ProcoreClient) -> Self {
        Self { client }
    }

    /// Lists a company's projects.
    pub async fn list(&self, company_id: i64) -> ProcoreResult<Vec<Project>> {
        require_id("company_id", company_id)?;

        let projects: Vec<ProjectDto> = self
            .client
            .get(
                Call::new("projects.list", RESOURCE).company(company_id),
                &format!("/rest/v1.0/companies/{}/projects", company_id),
                NO_QUERY,
            )
            .await?;
        self.to_domain(company_id, &projects)
    }

    /// Gets a project.
    pub async fn get(&self, company_id: i64, project_id: i64) -> ProcoreResult<Project> {
        require_id("company_id", company_id)?;
        require_id("project_id", project_id)?;

        let project: ProjectDto = self
            .client
            .get(
                Call::new("projects.get", RESOURCE).company(company_id),
                &format!("/rest/v1.0/projects/{}", project_id),
                &[("company_id", company_id)],
            )
            .await?;
        self.one_to_domain(company_id, &project)
    }

    /// Creates a project.
    pub async fn create(
        &self,
        company_id: i64,
        request: &CreateProjectRequest,
    ) -> ProcoreResult<Project> {
        require_id("company_id", company_id)?;
        request.validate()?;

        let body = ProjectEnvelope {
            company_id,
            project: ProjectWriteDto {
                name: Some(request.name.trim().to_string()),
                description: request.description.clone(),
                project_number: request.project_number.clone(),
                start_date: request.start_date.map(|d| d.to_string()),
                completion_date: request.end_date.map(|d| d.to_string()),
                active: Some(true),
            },
        };

        let project: ProjectDto = self
            .client
            .post(
                Call::new("projects.create", RESOURCE).company(company_id),
                "/rest/v1.0/projects",
                &body,
            )
            .await?;
        self.one_to_domain(company_id, &project)
    }

    /// Updates a project. Unset fields are left unchanged.
    pub async fn update(
        &self,
        company_id: i64,
        project_id: i64,
        request: &UpdateProjectRequest,
    ) -> ProcoreResult<Project> {
        require_id("company_id", company_id)?;
        require_id("project_id", project_id)?;
        request.validate()?;

        let body = ProjectEnvelope {
            company_id,
            project: ProjectWriteDto {
                name: request.name.as_ref().map(|n| n.trim().to_string()),
                description: request.description.clone(),
                project_number: request.project_number.clone(),
                start_date: request.start_date.map(|d| d.to_string()),
                completion_date: request.end_date.map(|d| d.to_string()),
                active: request.is_active,
            },
        };

        let project: ProjectDto = self
            .client
            .patch(
                Call::new("projects.update", RESOURCE).company(company_id),
                &format!("/rest/v1.0/projects/{}", project_id),
                &body,
            )
            .await?;
        self.one_to_domain(company_id, &project)
    }

    /// Active projects only.
    pub async fn list_active(&self, company_id: i64) -> ProcoreResult<Vec<Project>> {
        Ok(self
            .list(company_id)
            .await?
            .into_iter()
            .filter(|p| p.is_active)
            .collect())
    }

    /// Finds a project by exact name, ignoring case.
    pub async fn find_by_name(&self, company_id: i64, name: &str) -> ProcoreResult<Option<Project>> {
        require_text("name", name)?;
        let name = name.trim();

        Ok(self
            .list(company_id)
            .await?
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name)))
    }

    /// Lists one page of projects using server-side paging.
    pub async fn list_paged(
        &self,
        company_id: i64,
        options: &PaginationOptions,
    ) -> ProcoreResult<PagedResult<Project>> {
        require_id("company_id", company_id)?;
        options.validate()?;

        let projects: Vec<ProjectDto> = self
            .client
            .get(
                Call::new("projects.list_paged", RESOURCE).company(company_id),
                &format!("/rest/v1.0/companies/{}/projects", company_id),
                &options.query_pairs(),
            )
            .await?;
        let items = self.to_domain(company_id, &projects)?;
        Ok(PagedResult::from_server_page(items, options))
    }

    fn one_to_domain(&self, company_id: i64, project: &ProjectDto) -> ProcoreResult<Project> {
        let mut project = self.client.mappers.project.map_to_domain(project)?;
        if project.company_id == 0 {
            project.company_id = company_id;
        }
        Ok(project)
    }

    fn to_domain(&self, company_id: i64, projects: &[ProjectDto]) -> ProcoreResult<Vec<Project>> {
        projects
            .iter()
            .map(|p| self.one_to_domain(company_id, p))
            .collect()
    }
}
