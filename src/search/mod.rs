pub mod coordinator;

pub use coordinator::{SearchCoordinator, SearchResult, SearchResults};
