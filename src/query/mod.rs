pub mod filter;

pub use filter::{
    CustomPredicate, FilterEvaluator, FilterGroup, FilterNode, FilterOperator, GroupOperator, MetadataFilter,
    SearchFilters,
};
