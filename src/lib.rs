// Geosocial - location-aware social backend

// Core types and primitives
pub mod core;

// Coordinates, distance and geocoding
pub mod geo;

// Storage, sessions and request plumbing
pub mod infrastructure;

// Domain components - one collection each
pub mod domains;

// Multi-step use cases over the domain components
pub mod services;

// HTTP surface
pub mod routes;

pub mod app_state;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use app_state::AppState;
pub use error::{AppError, AppResult};
pub use routes::create_router;
