// Infrastructure: storage, sessions and request plumbing
pub mod collection;       // Typed collections and the shared database handle
pub mod database;         // Document store interface and query model
pub mod middleware;       // Request extractors
pub mod session;          // Authenticated-identity provider
pub mod sqlite_database;  // SQLite document store

pub use collection::{Collection, Database, Record};
pub use database::{DocumentStore, Filter, Predicate, SortOrder};
pub use session::{IdentityProvider, InMemorySessions};
pub use sqlite_database::SqliteDocumentStore;
