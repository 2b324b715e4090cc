use super::wire::FileDto;
use super::{
    extract_custom_fields, format_timestamp, parse_timestamp, parse_url, to_domain_error,
    MappingMetrics, TypeMapper,
};
use crate::error::MappingError;
use crate::types::{Document, User};

const SYSTEM_PROPERTIES: &[&str] = &[
    "id",
    "name",
    "description",
    "file_type",
    "size",
    "private",
    "created_at",
    "updated_at",
    "is_deleted",
    "is_tracked",
    "legacy_id",
    "parent_id",
    "name_with_path",
    "checked_out_by",
    "checked_out_until",
    "file_versions",
    "tracked_folder",
    "custom_fields",
];

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Maps files from the documents tool.
#[derive(Debug, Default)]
pub struct DocumentMapper {
    metrics: MappingMetrics,
}

impl DocumentMapper {
    /// Create new document mapper.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TypeMapper for DocumentMapper {
    type Domain = Document;
    type Wire = FileDto;

    const DOMAIN_TYPE: &'static str = "Document";
    const WIRE_TYPE: &'static str = "FileDto";

    fn convert_to_domain(&self, wire: &FileDto) -> Result<Document, MappingError> {
        let created_at = parse_timestamp(wire.created_at.as_deref())
            .map_err(|e| to_domain_error::<Self>("created_at", e))?;
        let updated_at = parse_timestamp(wire.updated_at.as_deref())
            .map_err(|e| to_domain_error::<Self>("updated_at", e))?;
        let file_url =
            parse_url(wire.url.as_deref()).map_err(|e| to_domain_error::<Self>("url", e))?;

        if let Some(size) = wire.size {
            if size < 0 {
                return Err(to_domain_error::<Self>("size", "File size cannot be negative"));
            }
        }

        let name = wire.name.clone().unwrap_or_default();
        let created_by = wire.created_by.as_ref().map(|person| {
            let (first_name, last_name) = match person.name.as_deref().map(str::trim) {
                Some(full) => match full.split_once(' ') {
                    Some((first, last)) => (first.to_string(), last.trim().to_string()),
                    None => (full.to_string(), String::new()),
                },
                None => (String::new(), String::new()),
            };
            User {
                id: person.id.unwrap_or_default(),
                email: person.login.clone().unwrap_or_default(),
                first_name,
                last_name,
                is_active: true,
                ..Default::default()
            }
        });

        Ok(Document {
            id: wire.id.unwrap_or_default(),
            file_name: name.clone(),
            name,
            description: wire.description.clone(),
            file_url,
            file_size: wire.size.unwrap_or_default(),
            content_type: wire
                .file_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            created_at,
            updated_at,
            created_by,
            is_private: wire.private.unwrap_or(false),
            custom_fields: extract_custom_fields(&wire.extra, SYSTEM_PROPERTIES),
        })
    }

    fn convert_to_wire(&self, domain: &Document) -> Result<FileDto, MappingError> {
        Ok(FileDto {
            id: (domain.id != 0).then_some(domain.id),
            name: Some(domain.name.clone()),
            description: domain.description.clone(),
            file_type: Some(domain.content_type.clone()),
            size: (domain.file_size != 0).then_some(domain.file_size),
            private: Some(domain.is_private),
            url: domain.file_url.clone(),
            created_at: format_timestamp(&domain.created_at),
            updated_at: format_timestamp(&domain.updated_at),
            created_by: None,
            parent_id: None,
            extra: domain.custom_fields.clone().unwrap_or_default(),
        })
    }

    fn metrics(&self) -> &MappingMetrics {
        &self.metrics
    }
}
