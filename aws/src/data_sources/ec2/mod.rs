mod data_source_prefix_list;

pub use data_source_prefix_list::PrefixListDataSource;
