pub mod schema;
pub mod services;
pub mod types;
