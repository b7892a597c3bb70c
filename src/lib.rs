pub mod config;
pub mod constants;
pub mod error;
pub mod observability;
pub mod pipeline;

// Layered boundaries: use cases depend on ports, adapters implement them
pub mod app;
pub mod infra;
