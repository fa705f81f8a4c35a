pub mod cost;
pub mod record;
pub mod usage;
