//! Domain types shared by every Brainy crate: nouns, verbs, metadata,
//! statistics, and change-log entries (see the data model).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable identifier for a noun. UUID-like, but any unique string is
/// accepted — the façade allocates `uuid::Uuid::new_v4()` strings, but
/// storage/index code treats ids as opaque.
pub type NounId = String;

/// Stable identifier for a verb.
pub type VerbId = String;

/// A fixed-length embedding vector. Dimension is recorded by the owning
/// index on first insert.
pub type Vector = Vec<f32>;

/// Opaque per-noun/verb metadata. The reserved key `nounType` selects the
/// storage partition (§3.1); every other key is free-form JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Metadata(pub HashMap<String, serde_json::Value>);

pub const NOUN_TYPE_KEY: &str = "nounType";

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `nounType` value, if present and a string.
    pub fn noun_type(&self) -> Option<&str> {
        self.0.get(NOUN_TYPE_KEY)?.as_str()
    }

    pub fn set_noun_type(&mut self, noun_type: impl Into<String>) {
        self.0
            .insert(NOUN_TYPE_KEY.to_string(), serde_json::Value::String(noun_type.into()));
    }
}

/// Noun storage partitions (§4.2). Unknown `nounType` values route to
/// `default`.
pub const NOUN_PARTITIONS: &[&str] = &[
    "person", "place", "thing", "event", "concept", "content", "default",
];

/// Resolves a `nounType` string to one of the seven logical partitions,
/// falling back to `default` for unrecognized types.
pub fn partition_for(noun_type: Option<&str>) -> &'static str {
    match noun_type {
        Some(t) => NOUN_PARTITIONS
            .iter()
            .find(|&&p| p == t)
            .copied()
            .unwrap_or("default"),
        None => "default",
    }
}

/// A noun's per-level neighbor connections, keyed by HNSW level.
pub type Connections = HashMap<u32, Vec<NounId>>;

/// An HNSW node together with its embedding and partition metadata
/// (§3.1 "HNSW Node (noun)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Noun {
    pub id: NounId,
    pub vector: Vector,
    pub connections: Connections,
    pub metadata: Metadata,
    /// Soft-delete tombstone; see §4.1 Delete.
    #[serde(default)]
    pub deleted: bool,
}

impl Noun {
    pub fn noun_type(&self) -> Option<&str> {
        self.metadata.noun_type()
    }
}

/// Relationship type tag: a closed set of common relations plus any
/// user-defined string (§3.1 "Graph Verb").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationshipType {
    RelatedTo,
    PartOf,
    Causes,
    Contains,
    References,
    DependsOn,
    Custom(String),
}

impl RelationshipType {
    fn known_name(&self) -> Option<&'static str> {
        Some(match self {
            RelationshipType::RelatedTo => "relatedTo",
            RelationshipType::PartOf => "partOf",
            RelationshipType::Causes => "causes",
            RelationshipType::Contains => "contains",
            RelationshipType::References => "references",
            RelationshipType::DependsOn => "dependsOn",
            RelationshipType::Custom(_) => return None,
        })
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.known_name() {
            Some(name) => f.write_str(name),
            None => match self {
                RelationshipType::Custom(s) => f.write_str(s),
                _ => unreachable!(),
            },
        }
    }
}

impl From<&str> for RelationshipType {
    fn from(s: &str) -> Self {
        match s {
            "relatedTo" => RelationshipType::RelatedTo,
            "partOf" => RelationshipType::PartOf,
            "causes" => RelationshipType::Causes,
            "contains" => RelationshipType::Contains,
            "references" => RelationshipType::References,
            "dependsOn" => RelationshipType::DependsOn,
            other => RelationshipType::Custom(other.to_string()),
        }
    }
}

impl From<String> for RelationshipType {
    fn from(s: String) -> Self {
        RelationshipType::from(s.as_str())
    }
}

impl Serialize for RelationshipType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RelationshipType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(RelationshipType::from(s))
    }
}

/// A directed, typed relationship between two nouns (§3.1 "Graph Verb").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verb {
    pub id: VerbId,
    pub source_id: NounId,
    pub target_id: NounId,
    pub verb_type: RelationshipType,
    pub vector: Option<Vector>,
    pub metadata: Metadata,
    pub created_at: i64,
    #[serde(default)]
    pub deleted: bool,
}

/// Durable statistics counters (§3.1 "Statistics"). Values never go
/// negative (invariant 7).
pub type Statistics = HashMap<String, u64>;

/// A pending, not-yet-flushed delta against a named counter. Negative
/// deltas are decrements; applying a delta clamps the resulting counter
/// at zero (Open Question iii).
pub type StatisticsDelta = HashMap<String, i64>;

pub const STAT_NOUN_COUNT: &str = "nounCount";
pub const STAT_VERB_COUNT: &str = "verbCount";
pub const STAT_HNSW_INDEX_SIZE: &str = "hnswIndexSize";

/// Applies a delta map onto a counters map, clamping every counter at
/// zero.
pub fn apply_deltas(counters: &mut Statistics, deltas: &StatisticsDelta) {
    for (name, delta) in deltas {
        let current = counters.entry(name.clone()).or_insert(0);
        *current = if *delta < 0 {
            current.saturating_sub(delta.unsigned_abs())
        } else {
            current.saturating_add(*delta as u64)
        };
    }
}

/// Append-only change-log entry kinds (§3.1 "Change Log Entry").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    AddNoun,
    DeleteNoun,
    AddVerb,
    DeleteVerb,
    Prune,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub seq: u64,
    pub op: OperationKind,
    pub id: String,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_for_known_type() {
        assert_eq!(partition_for(Some("person")), "person");
    }

    #[test]
    fn partition_for_unknown_type_routes_to_default() {
        assert_eq!(partition_for(Some("widget")), "default");
        assert_eq!(partition_for(None), "default");
    }

    #[test]
    fn relationship_type_round_trips_known_variant() {
        let t = RelationshipType::from("partOf");
        assert_eq!(t, RelationshipType::PartOf);
        assert_eq!(t.to_string(), "partOf");
    }

    #[test]
    fn relationship_type_preserves_custom_string() {
        let t = RelationshipType::from("mentors");
        assert_eq!(t, RelationshipType::Custom("mentors".to_string()));
        assert_eq!(t.to_string(), "mentors");
    }

    #[test]
    fn apply_deltas_clamps_at_zero() {
        let mut counters = Statistics::new();
        counters.insert("x".to_string(), 3);
        let mut deltas = StatisticsDelta::new();
        deltas.insert("x".to_string(), -10);
        apply_deltas(&mut counters, &deltas);
        assert_eq!(counters["x"], 0);
    }

    #[test]
    fn apply_deltas_sums_increments() {
        let mut counters = Statistics::new();
        let mut deltas = StatisticsDelta::new();
        deltas.insert("nounCount".to_string(), 5);
        apply_deltas(&mut counters, &deltas);
        deltas.insert("nounCount".to_string(), 3);
        apply_deltas(&mut counters, &deltas);
        assert_eq!(counters[STAT_NOUN_COUNT], 8);
    }
}
