use super::wire::{CompanyRefDto, ProjectDto, StageDto};
use super::{
    format_timestamp, parse_optional_date, parse_timestamp, to_domain_error, MappingMetrics,
    TypeMapper,
};
use crate::error::MappingError;
use crate::types::Project;

#[derive(Debug, Default)]
pub struct ProjectMapper {
    metrics: MappingMetrics,
}

impl ProjectMapper {
    /// Create new project mapper.
    pub fn new() -> Self {
        Self::default()
    }
}

fn stage_name(stage: Option<&StageDto>) -> Option<String> {
    let name = match stage? {
        StageDto::Name(name) => Some(name.clone()),
        StageDto::Object { name, .. } => name.clone(),
    };
    name.filter(|s| !s.is_empty())
}

impl TypeMapper for ProjectMapper {
    type Domain = Project;
    type Wire = ProjectDto;

    const DOMAIN_TYPE: &'static str = "Project";
    const WIRE_TYPE: &'static str = "ProjectDto";

    fn convert_to_domain(&self, wire: &ProjectDto) -> Result<Project, MappingError> {
        let start_date = parse_optional_date(wire.start_date.as_deref())
            .map_err(|e| to_domain_error::<Self>("start_date", e))?;
        let end_date = parse_optional_date(wire.completion_date.as_deref())
            .map_err(|e| to_domain_error::<Self>("completion_date", e))?;
        let created_at = parse_timestamp(wire.created_at.as_deref())
            .map_err(|e| to_domain_error::<Self>("created_at", e))?;
        let updated_at = parse_timestamp(wire.updated_at.as_deref())
            .map_err(|e| to_domain_error::<Self>("updated_at", e))?;

        Ok(Project {
            id: wire.id.unwrap_or_default(),
            name: wire.name.clone().unwrap_or_default(),
            description: wire.description.clone().filter(|d| !d.is_empty()),
            status: stage_name(wire.project_stage.as_ref())
                .or_else(|| stage_name(wire.stage.as_ref())),
            start_date,
            end_date,
            company_id: wire
                .company
                .as_ref()
                .and_then(|c| c.id)
                .unwrap_or_default(),
            project_number: wire.project_number.clone().filter(|n| !n.is_empty()),
            is_active: wire.active.unwrap_or(true),
            created_at,
            updated_at,
        })
    }

    fn convert_to_wire(&self, domain: &Project) -> Result<ProjectDto, MappingError> {
        Ok(ProjectDto {
            id: (domain.id != 0).then_some(domain.id),
            name: Some(domain.name.clone()),
            description: domain.description.clone(),
            stage: domain.status.clone().map(StageDto::Name),
            project_stage: None,
            start_date: domain.start_date.map(|d| d.to_string()),
            completion_date: domain.end_date.map(|d| d.to_string()),
            company: (domain.company_id != 0).then(|| CompanyRefDto {
                id: Some(domain.company_id),
                name: None,
            }),
            project_number: domain.project_number.clone(),
            active: Some(domain.is_active),
            created_at: format_timestamp(&domain.created_at),
            updated_at: format_timestamp(&domain.updated_at),
            extra: Default::default(),
        })
    }

    fn metrics(&self) -> &MappingMetrics {
        &self.metrics
    }
}
