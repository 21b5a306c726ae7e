//! Entity, relationship and request/response types at the graph store boundary

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Attribute key holding the last detection timestamp on a project node
pub const LAST_UPDATED_ATTR: &str = "lastUpdated";

/// Attribute key holding the comma-joined technology list on a project node
pub const TECHNOLOGIES_ATTR: &str = "technologies";

/// Scalar attribute value stored on a graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert a loosely typed JSON value; `None` for null
    ///
    /// Arrays and objects are flattened to their JSON text.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Integer(i)),
                None => n.as_f64().map(Self::Number),
            },
            Value::String(s) => Some(Self::Text(s)),
            other => Some(Self::Text(other.to_string())),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<usize> for AttributeValue {
    fn from(value: usize) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;

/// An entity submitted to the graph store
///
/// `name` is the store's dedup key. Re-adding an entity with the same name
/// replaces its attributes wholesale, so the attribute map must always be
/// complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEntity {
    pub name: String,
    pub summary: String,
    pub labels: Vec<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl GraphEntity {
    pub fn new(name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            labels: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}

/// Relationship predicates emitted by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Predicate {
    /// User works on project
    WorksOn,
    /// Project uses technology
    Uses,
    /// Project belongs to organization
    BelongsTo,
    /// Session occurs in project
    OccursIn,
}

impl Predicate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorksOn => "WORKS_ON",
            Self::Uses => "USES",
            Self::BelongsTo => "BELONGS_TO",
            Self::OccursIn => "OCCURS_IN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WORKS_ON" => Some(Self::WorksOn),
            "USES" => Some(Self::Uses),
            "BELONGS_TO" => Some(Self::BelongsTo),
            "OCCURS_IN" => Some(Self::OccursIn),
            _ => None,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A relationship submitted to the store as a free-text fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRelationship {
    pub subject: String,
    pub predicate: Predicate,
    pub object: String,
    pub confidence: f64,
    pub context: String,
}

impl ProjectRelationship {
    pub fn new(subject: impl Into<String>, predicate: Predicate, object: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            predicate,
            object: object.into(),
            confidence: 1.0,
            context: String::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// The sentence submitted to the store
    ///
    /// Byte-identical on every re-assertion; confidence and context are not
    /// part of it.
    pub fn fact(&self) -> String {
        format!("{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// What a search targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    Nodes,
    Edges,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub user_id: String,
    pub query: String,
    pub scope: SearchScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_filters: Option<SearchFilters>,
    pub limit: usize,
}

impl SearchRequest {
    pub fn nodes(user_id: impl Into<String>, query: impl Into<String>, limit: usize) -> Self {
        Self {
            user_id: user_id.into(),
            query: query.into(),
            scope: SearchScope::Nodes,
            search_filters: None,
            limit,
        }
    }

    pub fn edges(user_id: impl Into<String>, query: impl Into<String>, limit: usize) -> Self {
        Self {
            scope: SearchScope::Edges,
            ..Self::nodes(user_id, query, limit)
        }
    }

    pub fn with_node_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_filters = Some(SearchFilters {
            node_labels: labels.into_iter().map(Into::into).collect(),
        });
        self
    }
}

/// A node returned by the store, already validated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl GraphNode {
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Parsed `lastUpdated` attribute
    ///
    /// Accepts RFC 3339 text or epoch milliseconds; anything else is `None`.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        match self.attribute(LAST_UPDATED_ATTR)? {
            AttributeValue::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|ts| ts.with_timezone(&Utc)),
            AttributeValue::Integer(millis) => Utc.timestamp_millis_opt(*millis).single(),
            _ => None,
        }
    }

    /// Technology names recorded on the node, in stored order
    pub fn technologies(&self) -> Vec<String> {
        self.attribute(TECHNOLOGIES_ATTR)
            .and_then(AttributeValue::as_str)
            .map(split_technologies)
            .unwrap_or_default()
    }
}

impl From<GraphEntity> for GraphNode {
    fn from(entity: GraphEntity) -> Self {
        Self {
            uuid: None,
            name: entity.name,
            summary: entity.summary,
            labels: entity.labels,
            attributes: entity.attributes,
            created_at: None,
        }
    }
}

/// An edge (fact) returned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default)]
    pub name: String,
    pub fact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_node_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node_uuid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Payload kind for [`AddRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Structured entity document
    Json,
    /// Free-text fact
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddRequest {
    pub user_id: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub data: String,
}

impl AddRequest {
    pub fn entity(user_id: impl Into<String>, entity: &GraphEntity) -> serde_json::Result<Self> {
        Ok(Self {
            user_id: user_id.into(),
            data_type: DataType::Json,
            data: serde_json::to_string(entity)?,
        })
    }

    pub fn fact(user_id: impl Into<String>, relationship: &ProjectRelationship) -> Self {
        Self {
            user_id: user_id.into(),
            data_type: DataType::Text,
            data: relationship.fact(),
        }
    }
}

/// Join technology names into the stored attribute form
pub fn join_technologies<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| n.as_ref())
        .collect::<Vec<_>>()
        .join(",")
}

/// Split the stored attribute form back into names
pub fn split_technologies(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
