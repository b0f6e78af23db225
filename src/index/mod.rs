pub mod flat;
pub mod ivf;
pub mod metric;
pub mod registry;
pub mod vector_index;

pub use registry::{IndexRegistry, SharedIndex};
pub use vector_index::VectorIndex;
