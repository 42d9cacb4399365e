pub mod memory;
pub mod postgres;
pub mod schema;
pub mod traits;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use traits::*;
