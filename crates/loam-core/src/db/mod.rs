//! Repository runtime: records, conversion, queries, templates, and dispatch.

pub mod convert;
pub mod memory;
pub mod query;
pub mod record;
pub mod repository;
pub mod template;
pub mod workflow;

// re-exports
pub use convert::{ConvertError, EntityConverter};
pub use memory::MemoryTemplate;
pub use record::Record;
pub use repository::{Dispatcher, Repository, RepositoryConfig};
pub use template::{AsyncTemplate, EntityTemplate, Template, TemplateError};
pub use workflow::{PersistListener, PersistWorkflow};
