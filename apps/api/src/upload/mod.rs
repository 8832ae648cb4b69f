//! Resume and cover-letter uploads: destination naming, the coordinator that
//! fans a session's selections out to the object store, and the HTTP handlers.

pub mod coordinator;
pub mod handlers;
pub mod paths;

pub use coordinator::{UploadCoordinator, UploadReport};
