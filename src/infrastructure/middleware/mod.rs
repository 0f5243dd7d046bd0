// Request extractors - resolve the caller's session before handlers run

pub mod viewer_extractor;

pub use viewer_extractor::{SessionHeader, Viewer};
