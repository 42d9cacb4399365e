mod data;

pub use data::{load_seed_data, SEED_AREA_CODE};
