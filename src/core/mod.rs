// Core types and primitives

pub mod id_generator;
pub mod strong_types;
pub mod time;

pub use id_generator::DocIdGenerator;
pub use strong_types::{DocId, SessionToken};
