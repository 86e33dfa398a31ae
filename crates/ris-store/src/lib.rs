pub mod config;
pub mod error;
pub mod schema;
pub mod store;
pub mod table;

pub use config::{CodebookConfig, RisConfig, TransportConfig, data_dir, default_base_dir};
pub use error::{Result, StoreError};
pub use store::{CachedCodebook, CodebookStore};
pub use table::{read_table_file, write_table_file};
