pub mod store;
pub mod types;

pub use store::{descriptor_path, list_descriptor_files, read_descriptor, write_descriptor, DescriptorFile};
pub use types::{ColumnDescriptor, TableDescriptor};
