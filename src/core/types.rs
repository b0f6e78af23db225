use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

macro_rules! identity_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                $name(Uuid::new_v4())
            }

            pub fn value(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                $name(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

identity_type!(LibraryId);
identity_type!(DocumentId);
identity_type!(ChunkId);

/// A metadata value. Mirrors the handful of JSON-primitive shapes callers
/// attach to chunks/documents/libraries, plus a list of scalars for `in` /
/// `contains`-style predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    List(Vec<MetadataValue>),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Integer(i) => Some(*i as f64),
            MetadataValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, MetadataValue::List(_))
    }
}

pub type Metadata = HashMap<String, MetadataValue>;

/// A scoring function for vector search. Larger is always better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cosine,
    Euclidean,
    DotProduct,
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Cosine
    }
}

impl Metric {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "cosine" => Some(Metric::Cosine),
            "euclidean" => Some(Metric::Euclidean),
            "dot_product" => Some(Metric::DotProduct),
            _ => None,
        }
    }
}

/// Which vector index variant a library is configured to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Flat,
    Ivf,
}

impl Default for IndexKind {
    fn default() -> Self {
        IndexKind::Flat
    }
}

/// Per-library index configuration, as recognized from the external
/// interface's `metric` / `nlist` / `nprobe` keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub metric: Metric,
    pub nlist: Option<usize>,
    pub nprobe: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
    pub document_id: DocumentId,
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    pub fn new(text: String, embedding: Vec<f32>, metadata: Metadata, document_id: DocumentId) -> Self {
        Chunk {
            id: ChunkId::new(),
            text,
            embedding,
            metadata,
            document_id,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    #[serde(default)]
    pub chunk_ids: Vec<ChunkId>,
    #[serde(default)]
    pub metadata: Metadata,
    pub library_id: LibraryId,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(name: String, metadata: Metadata, library_id: LibraryId) -> Self {
        Document {
            id: DocumentId::new(),
            name,
            chunk_ids: Vec::new(),
            metadata,
            library_id,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
    #[serde(default)]
    pub document_ids: Vec<DocumentId>,
    #[serde(default)]
    pub metadata: Metadata,
    pub index_kind: IndexKind,
    pub index_config: IndexConfig,
    pub created_at: DateTime<Utc>,
}

impl Library {
    pub fn new(name: String, metadata: Metadata, index_kind: IndexKind, index_config: IndexConfig) -> Self {
        Library {
            id: LibraryId::new(),
            name,
            document_ids: Vec::new(),
            metadata,
            index_kind,
            index_config,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_parses_recognized_strings_only() {
        assert_eq!(Metric::parse("cosine"), Some(Metric::Cosine));
        assert_eq!(Metric::parse("euclidean"), Some(Metric::Euclidean));
        assert_eq!(Metric::parse("dot_product"), Some(Metric::DotProduct));
        assert_eq!(Metric::parse("manhattan"), None);
    }

    #[test]
    fn identities_are_unique_per_construction() {
        let a = ChunkId::new();
        let b = ChunkId::new();
        assert_ne!(a, b);
    }
}
