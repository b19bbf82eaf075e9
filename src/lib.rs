pub mod api;
pub mod global;
