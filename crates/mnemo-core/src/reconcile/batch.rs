//! Two-phase upsert batch
//!
//! Phase one submits every entity, phase two every fact. Facts name
//! entities, so entities go first. Every item of both phases is attempted
//! even after a failure; the report says what landed.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::graph::{AddRequest, GraphEntity, GraphStoreClient, ProjectRelationship};

/// Entities and facts to submit together
#[derive(Debug, Clone, Default)]
pub struct UpsertBatch {
    pub entities: Vec<GraphEntity>,
    pub relationships: Vec<ProjectRelationship>,
}

/// Outcome of one phase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseReport {
    pub attempted: usize,
    pub written: usize,
    pub failures: Vec<String>,
}

impl PhaseReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of both phases
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub entities: PhaseReport,
    pub facts: PhaseReport,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.entities.is_complete() && self.facts.is_complete()
    }

    pub fn failure_count(&self) -> usize {
        self.entities.failures.len() + self.facts.failures.len()
    }

    /// Collapse into a service error when anything failed
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            return Ok(self);
        }
        let attempted = self.entities.attempted + self.facts.attempted;
        let first = self
            .entities
            .failures
            .iter()
            .chain(self.facts.failures.iter())
            .next()
            .cloned()
            .unwrap_or_default();
        Err(Error::Service(format!(
            "{} of {} graph writes failed; first failure: {}",
            self.failure_count(),
            attempted,
            first
        )))
    }
}

impl UpsertBatch {
    pub fn new(entities: Vec<GraphEntity>, relationships: Vec<ProjectRelationship>) -> Self {
        Self {
            entities,
            relationships,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }

    /// Phase one: structured entity documents
    pub async fn submit_entities(&self, store: &dyn GraphStoreClient, user_id: &str) -> PhaseReport {
        let mut report = PhaseReport::default();

        for entity in &self.entities {
            report.attempted += 1;
            let outcome = match AddRequest::entity(user_id, entity) {
                Ok(request) => store.add(&request).await,
                Err(e) => Err(e.into()),
            };
            match outcome {
                Ok(()) => {
                    report.written += 1;
                    debug!(entity = %entity.name, "Entity submitted");
                }
                Err(e) => {
                    warn!(entity = %entity.name, error = %e, "Entity submission failed");
                    report.failures.push(format!("entity '{}': {}", entity.name, e));
                }
            }
        }

        report
    }

    /// Phase two: text facts
    pub async fn submit_facts(&self, store: &dyn GraphStoreClient, user_id: &str) -> PhaseReport {
        let mut report = PhaseReport::default();

        for relationship in &self.relationships {
            report.attempted += 1;
            let fact = relationship.fact();
            match store.add(&AddRequest::fact(user_id, relationship)).await {
                Ok(()) => {
                    report.written += 1;
                    debug!(fact = %fact, "Fact submitted");
                }
                Err(e) => {
                    warn!(fact = %fact, error = %e, "Fact submission failed");
                    report.failures.push(format!("fact '{}': {}", fact, e));
                }
            }
        }

        report
    }

    /// Run both phases in order
    pub async fn submit(&self, store: &dyn GraphStoreClient, user_id: &str) -> BatchReport {
        let entities = self.submit_entities(store, user_id).await;
        let facts = self.submit_facts(store, user_id).await;
        BatchReport { entities, facts }
    }
}
