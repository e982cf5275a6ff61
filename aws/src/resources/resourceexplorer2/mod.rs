mod resource_index;

pub use resource_index::IndexResource;
