// crates/db/src/queries/mod.rs
// Document job and session queries.

mod documents;
pub(crate) mod row_types;
mod sessions;

pub use documents::{DocumentRecord, NewDocument};
pub use sessions::SessionPurge;
