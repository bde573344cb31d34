//! Upload directory storage: path resolution, aliases, atomic commits and
//! per-alias locking

pub mod alias;
pub mod locks;
pub mod resolver;
pub mod writer;

pub use alias::{alias_name, pdf_stem, AliasManager, ALIAS_SUFFIX};
pub use locks::{AliasGuard, AliasLocks};
pub use resolver::{sanitize_filename, PathResolver};
pub use writer::{apply_mutation, commit_bytes, read_existing, TEMP_SUFFIX};
