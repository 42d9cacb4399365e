pub mod actor;
pub mod catalog;
pub mod change;
pub mod common;
pub mod entity;
pub mod field;
pub mod lifecycle;
pub mod query;
pub mod record;
pub mod risk;

pub use actor::*;
pub use catalog::{catalog, definition, Catalog, Dependent, EntityDef, EntitySummary, UniqueKey};
pub use change::*;
pub use common::*;
pub use entity::*;
pub use field::*;
pub use lifecycle::Lifecycle;
pub use query::*;
pub use record::*;
pub use risk::{severity, severity_matrix, Severity, SeverityMatrix};
