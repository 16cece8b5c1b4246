//! String-list sources backing allow/deny membership checks.
//!
//! Every source yields a cleaned list: `#`-comments stripped, entries
//! trimmed, blanks dropped, order preserved, duplicates kept. Remote
//! sources sit behind a stale-while-revalidate cache so the request path
//! never waits on a warm fetch.

pub mod clean;
pub mod source;
pub mod stores;

pub use clean::clean_lines;
pub use source::{BlobSource, EntityKeysSource, FileSource, ListSource, DEFAULT_ENTITY_LIMIT};
pub use stores::{BlobStore, EntityKeyStore, StaticBlobStore, StaticEntityKeyStore};
