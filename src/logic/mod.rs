pub mod analytics;
pub mod clock;
pub mod integrity;
pub mod journal;
pub mod query;
pub mod rules;
pub mod service;
pub mod validate;

pub use clock::{Clock, ManualClock, SystemClock};
pub use query::{parse_list_query, QueryLimits};
pub use service::{DeleteSummary, EntityService, RecordRef, ServiceSettings};
