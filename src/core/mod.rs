//! core
//!
//! Domain types and cross-cutting concerns shared by every layer:
//! validated newtypes, the error taxonomy that drives exit codes,
//! committer identity resolution, and storage path routing.

pub mod errors;
pub mod identity;
pub mod paths;
pub mod types;

pub use errors::WeldError;
pub use identity::Identity;
pub use paths::WeldPaths;
pub use types::{Oid, SubmodulePath, TypeError};
