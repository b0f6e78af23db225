use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::error::{Error, Result};
use crate::core::types::{Chunk, DocumentId, Metadata, MetadataValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
}

/// A single `(field, operator, value)` predicate. Validated at construction
/// so a malformed leaf can never reach evaluation: `in`/`not_in` require a
/// list value, the string operators require a string value.
#[derive(Debug, Clone)]
pub struct MetadataFilter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: MetadataValue,
}

impl MetadataFilter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: MetadataValue) -> Result<Self> {
        match operator {
            FilterOperator::In | FilterOperator::NotIn => {
                if !value.is_list() {
                    return Err(Error::validation("in/not_in requires a list value"));
                }
            }
            FilterOperator::Contains
            | FilterOperator::NotContains
            | FilterOperator::StartsWith
            | FilterOperator::EndsWith => {
                if value.as_str().is_none() {
                    return Err(Error::validation("string operator requires a string value"));
                }
            }
            _ => {}
        }
        Ok(MetadataFilter {
            field: field.into(),
            operator,
            value,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOperator {
    And,
    Or,
}

#[derive(Debug, Clone)]
pub enum FilterNode {
    Leaf(MetadataFilter),
    Group(FilterGroup),
}

/// A non-empty AND/OR group of child predicates. Groups nest.
#[derive(Debug, Clone)]
pub struct FilterGroup {
    pub operator: GroupOperator,
    pub children: Vec<FilterNode>,
}

impl FilterGroup {
    pub fn new(operator: GroupOperator, children: Vec<FilterNode>) -> Result<Self> {
        if children.is_empty() {
            return Err(Error::validation("filter group must not be empty"));
        }
        Ok(FilterGroup { operator, children })
    }
}

/// A candidate predicate supplied in-process; never crosses a transport
/// boundary. A panic inside it is caught and treated as `false` for that
/// candidate only — search continues.
pub type CustomPredicate = Arc<dyn Fn(&Chunk) -> bool + Send + Sync>;

/// The combined declarative-plus-custom filter spec attached to a search.
#[derive(Clone, Default)]
pub struct SearchFilters {
    pub metadata: Option<FilterGroup>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub document_ids: Option<Vec<DocumentId>>,
    pub custom_predicate: Option<CustomPredicate>,
}

impl fmt::Debug for SearchFilters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SearchFilters")
            .field("metadata", &self.metadata)
            .field("created_after", &self.created_after)
            .field("created_before", &self.created_before)
            .field("document_ids", &self.document_ids)
            .field("custom_predicate", &self.custom_predicate.is_some())
            .finish()
    }
}

impl SearchFilters {
    pub fn has_custom(&self) -> bool {
        self.custom_predicate.is_some()
    }
}

pub struct FilterEvaluator;

impl FilterEvaluator {
    /// A custom predicate, if present, is the sole filter — declarative
    /// parts are ignored entirely.
    pub fn matches(filters: &SearchFilters, chunk: &Chunk) -> bool {
        if let Some(predicate) = &filters.custom_predicate {
            return panic::catch_unwind(AssertUnwindSafe(|| predicate(chunk))).unwrap_or(false);
        }

        if let Some(after) = filters.created_after {
            if chunk.created_at <= after {
                return false;
            }
        }
        if let Some(before) = filters.created_before {
            if chunk.created_at >= before {
                return false;
            }
        }
        if let Some(ids) = &filters.document_ids {
            if !ids.contains(&chunk.document_id) {
                return false;
            }
        }
        if let Some(group) = &filters.metadata {
            if !evaluate_group(group, &chunk.metadata) {
                return false;
            }
        }
        true
    }
}

fn evaluate_group(group: &FilterGroup, metadata: &Metadata) -> bool {
    match group.operator {
        GroupOperator::And => group.children.iter().all(|child| evaluate_node(child, metadata)),
        GroupOperator::Or => group.children.iter().any(|child| evaluate_node(child, metadata)),
    }
}

fn evaluate_node(node: &FilterNode, metadata: &Metadata) -> bool {
    match node {
        FilterNode::Leaf(leaf) => evaluate_leaf(leaf, metadata),
        FilterNode::Group(group) => evaluate_group(group, metadata),
    }
}

fn evaluate_leaf(leaf: &MetadataFilter, metadata: &Metadata) -> bool {
    let Some(actual) = metadata.get(&leaf.field) else {
        return false;
    };

    // A list-valued field only supports eq/ne; every other operator is
    // false against it (see DESIGN.md).
    if actual.is_list() && !matches!(leaf.operator, FilterOperator::Eq | FilterOperator::Ne) {
        return false;
    }

    match leaf.operator {
        FilterOperator::Eq => actual == &leaf.value,
        FilterOperator::Ne => actual != &leaf.value,
        FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte => {
            compare_ordered(actual, &leaf.value, leaf.operator)
        }
        FilterOperator::In => test_in(actual, &leaf.value, false),
        FilterOperator::NotIn => test_in(actual, &leaf.value, true),
        FilterOperator::Contains
        | FilterOperator::NotContains
        | FilterOperator::StartsWith
        | FilterOperator::EndsWith => test_string_op(actual, &leaf.value, leaf.operator),
    }
}

fn ordered_cmp(actual: &MetadataValue, value: &MetadataValue) -> Option<std::cmp::Ordering> {
    use MetadataValue::*;
    match (actual, value) {
        (Integer(a), Integer(b)) => a.partial_cmp(b),
        (Float(a), Float(b)) => a.partial_cmp(b),
        (Integer(a), Float(b)) => (*a as f64).partial_cmp(b),
        (Float(a), Integer(b)) => a.partial_cmp(&(*b as f64)),
        (Text(a), Text(b)) => a.partial_cmp(b),
        (Timestamp(a), Timestamp(b)) => a.partial_cmp(b),
        (Boolean(a), Boolean(b)) => a.partial_cmp(b),
        _ => None,
    }
}

fn compare_ordered(actual: &MetadataValue, value: &MetadataValue, operator: FilterOperator) -> bool {
    use std::cmp::Ordering::*;
    match ordered_cmp(actual, value) {
        Some(Greater) => matches!(operator, FilterOperator::Gt | FilterOperator::Gte),
        Some(Less) => matches!(operator, FilterOperator::Lt | FilterOperator::Lte),
        Some(Equal) => matches!(operator, FilterOperator::Gte | FilterOperator::Lte),
        None => false,
    }
}

fn test_in(actual: &MetadataValue, value: &MetadataValue, negate: bool) -> bool {
    let MetadataValue::List(items) = value else {
        return false;
    };
    let found = items.iter().any(|item| item == actual);
    if negate { !found } else { found }
}

fn test_string_op(actual: &MetadataValue, value: &MetadataValue, operator: FilterOperator) -> bool {
    let (Some(actual), Some(value)) = (actual.as_str(), value.as_str()) else {
        return false;
    };
    match operator {
        FilterOperator::Contains => actual.contains(value),
        FilterOperator::NotContains => !actual.contains(value),
        FilterOperator::StartsWith => actual.starts_with(value),
        FilterOperator::EndsWith => actual.ends_with(value),
        _ => unreachable!("non-string operator routed into test_string_op"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DocumentId;
    use std::collections::HashMap;

    fn chunk_with(metadata: Vec<(&str, MetadataValue)>) -> Chunk {
        let map: Metadata = metadata.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        Chunk::new("text".into(), vec![1.0], map, DocumentId::new())
    }

    #[test]
    fn missing_field_is_false_for_every_operator() {
        let chunk = chunk_with(vec![]);
        let leaf = MetadataFilter::new("category", FilterOperator::Eq, MetadataValue::Text("tech".into())).unwrap();
        let group = FilterGroup::new(GroupOperator::And, vec![FilterNode::Leaf(leaf)]).unwrap();
        let filters = SearchFilters {
            metadata: Some(group),
            ..Default::default()
        };
        assert!(!FilterEvaluator::matches(&filters, &chunk));
    }

    #[test]
    fn in_requires_list_value_at_construction() {
        assert!(MetadataFilter::new("category", FilterOperator::In, MetadataValue::Text("tech".into())).is_err());
        assert!(MetadataFilter::new(
            "category",
            FilterOperator::In,
            MetadataValue::List(vec![MetadataValue::Text("tech".into())])
        )
        .is_ok());
    }

    #[test]
    fn string_operator_requires_string_value_at_construction() {
        assert!(MetadataFilter::new("category", FilterOperator::Contains, MetadataValue::Integer(1)).is_err());
    }

    #[test]
    fn empty_group_is_rejected() {
        assert!(FilterGroup::new(GroupOperator::And, vec![]).is_err());
    }

    #[test]
    fn and_group_requires_every_child() {
        let chunk = chunk_with(vec![("category", MetadataValue::Text("tech".into())), ("score", MetadataValue::Integer(5))]);
        let a = MetadataFilter::new("category", FilterOperator::Eq, MetadataValue::Text("tech".into())).unwrap();
        let b = MetadataFilter::new("score", FilterOperator::Gt, MetadataValue::Integer(10)).unwrap();
        let group = FilterGroup::new(GroupOperator::And, vec![FilterNode::Leaf(a), FilterNode::Leaf(b)]).unwrap();
        let filters = SearchFilters {
            metadata: Some(group),
            ..Default::default()
        };
        assert!(!FilterEvaluator::matches(&filters, &chunk));
    }

    #[test]
    fn or_group_requires_only_one_child() {
        let chunk = chunk_with(vec![("category", MetadataValue::Text("tech".into())), ("score", MetadataValue::Integer(5))]);
        let a = MetadataFilter::new("category", FilterOperator::Eq, MetadataValue::Text("tech".into())).unwrap();
        let b = MetadataFilter::new("score", FilterOperator::Gt, MetadataValue::Integer(10)).unwrap();
        let group = FilterGroup::new(GroupOperator::Or, vec![FilterNode::Leaf(a), FilterNode::Leaf(b)]).unwrap();
        let filters = SearchFilters {
            metadata: Some(group),
            ..Default::default()
        };
        assert!(FilterEvaluator::matches(&filters, &chunk));
    }

    #[test]
    fn incompatible_ordered_types_are_false_not_an_error() {
        let chunk = chunk_with(vec![("category", MetadataValue::Text("tech".into()))]);
        let leaf = MetadataFilter::new("category", FilterOperator::Gt, MetadataValue::Integer(1)).unwrap();
        let group = FilterGroup::new(GroupOperator::And, vec![FilterNode::Leaf(leaf)]).unwrap();
        let filters = SearchFilters {
            metadata: Some(group),
            ..Default::default()
        };
        assert!(!FilterEvaluator::matches(&filters, &chunk));
    }

    #[test]
    fn list_valued_field_only_supports_eq_and_ne() {
        let chunk = chunk_with(vec![(
            "tags",
            MetadataValue::List(vec![MetadataValue::Text("a".into()), MetadataValue::Text("b".into())]),
        )]);
        let contains = MetadataFilter::new("tags", FilterOperator::Contains, MetadataValue::Text("a".into()));
        // construction succeeds (value is a string); evaluation against a list-valued field is what's false.
        let contains = contains.unwrap();
        let group = FilterGroup::new(GroupOperator::And, vec![FilterNode::Leaf(contains)]).unwrap();
        let filters = SearchFilters {
            metadata: Some(group),
            ..Default::default()
        };
        assert!(!FilterEvaluator::matches(&filters, &chunk));
    }

    #[test]
    fn custom_predicate_overrides_declarative_parts() {
        let chunk = chunk_with(vec![("category", MetadataValue::Text("sports".into()))]);
        let declarative = MetadataFilter::new("category", FilterOperator::Eq, MetadataValue::Text("tech".into())).unwrap();
        let group = FilterGroup::new(GroupOperator::And, vec![FilterNode::Leaf(declarative)]).unwrap();
        let filters = SearchFilters {
            metadata: Some(group),
            custom_predicate: Some(Arc::new(|_chunk: &Chunk| true)),
            ..Default::default()
        };
        assert!(FilterEvaluator::matches(&filters, &chunk));
    }

    #[test]
    fn panicking_custom_predicate_is_treated_as_false() {
        let chunk = chunk_with(vec![]);
        let filters = SearchFilters {
            custom_predicate: Some(Arc::new(|_chunk: &Chunk| panic!("boom"))),
            ..Default::default()
        };
        assert!(!FilterEvaluator::matches(&filters, &chunk));
    }

    #[test]
    fn document_id_predicate_restricts_to_allowed_list() {
        let document_id = DocumentId::new();
        let chunk = Chunk::new("t".into(), vec![1.0], HashMap::new(), document_id);
        let filters = SearchFilters {
            document_ids: Some(vec![DocumentId::new()]),
            ..Default::default()
        };
        assert!(!FilterEvaluator::matches(&filters, &chunk));

        let filters = SearchFilters {
            document_ids: Some(vec![document_id]),
            ..Default::default()
        };
        assert!(FilterEvaluator::matches(&filters, &chunk));
    }
}
