mod resource_replica_key;

pub use resource_replica_key::ReplicaKeyResource;
