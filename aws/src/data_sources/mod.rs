//! Data source implementations

pub mod ec2;

pub use ec2::PrefixListDataSource;
