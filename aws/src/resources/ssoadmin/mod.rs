mod resource_application_assignment;

pub use resource_application_assignment::ApplicationAssignmentResource;
