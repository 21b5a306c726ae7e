//! Entity and relationship construction
//!
//! Pure functions from (context, detection, stored node) to the set of
//! entities and facts to submit. The project entity always carries a full
//! attribute map: the stored attributes first, then identity fields, then
//! detection fields when a detection ran.

use chrono::{DateTime, Utc};

use crate::graph::{
    AttributeValue, Attributes, GraphEntity, GraphNode, LAST_UPDATED_ATTR, Predicate,
    ProjectRelationship, TECHNOLOGIES_ATTR, join_technologies,
};
use crate::project::{DetectedTechnology, ProjectContext, TechnologyDetectionResult};

use super::staleness::PROJECT_LABEL;

pub const TECHNOLOGY_LABEL: &str = "Technology";
pub const ORGANIZATION_LABEL: &str = "Organization";

/// Fixed confidence for project → organization facts
pub const ORGANIZATION_CONFIDENCE: f64 = 0.95;

/// Build the project entity
pub fn project_entity(
    context: &ProjectContext,
    existing: Option<&GraphNode>,
    detection: Option<&TechnologyDetectionResult>,
    now: DateTime<Utc>,
) -> GraphEntity {
    let mut attributes: Attributes = existing
        .map(|node| node.attributes.clone())
        .unwrap_or_default();

    apply_identity(&mut attributes, context);

    if let Some(detection) = detection {
        let names = detection.names();
        attributes.insert(
            TECHNOLOGIES_ATTR.to_string(),
            join_technologies(&names).into(),
        );
        attributes.insert("technologyCount".to_string(), names.len().into());
        attributes.insert(
            "detectionConfidence".to_string(),
            detection.overall_confidence.into(),
        );
        attributes.insert(LAST_UPDATED_ATTR.to_string(), now.to_rfc3339().into());
    }

    let technologies = attributes
        .get(TECHNOLOGIES_ATTR)
        .and_then(AttributeValue::as_str)
        .map(crate::graph::split_technologies)
        .unwrap_or_default();

    GraphEntity {
        name: context.project_name.clone(),
        summary: project_summary(context, &technologies),
        labels: vec![PROJECT_LABEL.to_string(), context.project_type.clone()],
        attributes,
    }
}

fn apply_identity(attributes: &mut Attributes, context: &ProjectContext) {
    let mut set = |key: &str, value: Option<String>| match value {
        Some(value) => {
            attributes.insert(key.to_string(), value.into());
        }
        None => {
            attributes.remove(key);
        }
    };

    set("projectId", Some(context.project_id.clone()));
    set("projectName", Some(context.project_name.clone()));
    set("projectPath", Some(context.path_display()));
    set("projectType", Some(context.project_type.clone()));
    set("groupId", Some(context.group_id.clone()));
    set("organization", context.organization.clone());
    set("gitRemote", context.git_remote.clone());
}

fn project_summary(context: &ProjectContext, technologies: &[String]) -> String {
    let mut summary = format!(
        "{} is a {} project located at {}",
        context.project_name,
        context.project_type,
        context.path_display()
    );
    if let Some(org) = &context.organization {
        summary.push_str(&format!(", owned by {}", org));
    }
    if !technologies.is_empty() {
        summary.push_str(&format!(". Technologies: {}", technologies.join(", ")));
    }
    summary
}

/// Build a technology entity
pub fn technology_entity(tech: &DetectedTechnology, now: DateTime<Utc>) -> GraphEntity {
    let mut entity = GraphEntity::new(
        tech.name.clone(),
        format!("{} technology detected from {}", tech.name, tech.source),
    )
    .with_labels([TECHNOLOGY_LABEL, tech.source.as_str()])
    .with_attribute("source", tech.source.clone())
    .with_attribute("confidence", tech.confidence)
    .with_attribute("lastDetected", now.to_rfc3339());

    if let Some(version) = &tech.version {
        entity = entity.with_attribute("version", version.clone());
    }
    if let Some(context) = &tech.context {
        entity = entity.with_attribute("context", context.clone());
    }
    entity
}

/// Build an organization entity
pub fn organization_entity(organization: &str) -> GraphEntity {
    GraphEntity::new(organization, format!("{} is an organization", organization))
        .with_labels([ORGANIZATION_LABEL])
        .with_attribute("organization", organization)
}

/// Full entity set: project, one per technology, organization if known
pub fn build_entities(
    context: &ProjectContext,
    existing: Option<&GraphNode>,
    detection: Option<&TechnologyDetectionResult>,
    now: DateTime<Utc>,
) -> Vec<GraphEntity> {
    let mut entities = vec![project_entity(context, existing, detection, now)];

    if let Some(detection) = detection {
        entities.extend(
            detection
                .technologies
                .iter()
                .map(|tech| technology_entity(tech, now)),
        );
    }

    if let Some(org) = &context.organization {
        entities.push(organization_entity(org));
    }

    entities
}

/// Full relationship set for one sync
pub fn build_relationships(
    user_id: &str,
    context: &ProjectContext,
    detection: Option<&TechnologyDetectionResult>,
    session_id: Option<&str>,
) -> Vec<ProjectRelationship> {
    let project = context.project_name.as_str();
    let mut relationships = vec![
        ProjectRelationship::new(user_id, Predicate::WorksOn, project)
            .with_context(format!("Developer activity in {}", context.path_display())),
    ];

    if let Some(detection) = detection {
        relationships.extend(detection.technologies.iter().map(|tech| {
            ProjectRelationship::new(project, Predicate::Uses, tech.name.clone())
                .with_confidence(tech.confidence)
                .with_context(
                    tech.context
                        .clone()
                        .unwrap_or_else(|| format!("Detected via {}", tech.source)),
                )
        }));
    }

    if let Some(org) = &context.organization {
        relationships.push(
            ProjectRelationship::new(project, Predicate::BelongsTo, org.clone())
                .with_confidence(ORGANIZATION_CONFIDENCE)
                .with_context("Derived from the git remote"),
        );
    }

    if let Some(session_id) = session_id {
        relationships.push(
            ProjectRelationship::new(session_subject(session_id), Predicate::OccursIn, project)
                .with_context("Assistant session"),
        );
    }

    relationships
}

/// Subject used for session facts
pub fn session_subject(session_id: &str) -> String {
    format!("Session {}", session_id)
}
