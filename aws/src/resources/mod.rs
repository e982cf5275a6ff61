//! Resource implementations

pub mod kms;
pub mod networkmonitor;
pub mod resourceexplorer2;
pub mod ssoadmin;

pub use kms::ReplicaKeyResource;
pub use networkmonitor::MonitorResource;
pub use resourceexplorer2::IndexResource;
pub use ssoadmin::ApplicationAssignmentResource;
