//! On-disk cache for fetched sources and built artifacts
//!
//! Every library gets three kinds of directories under its base directory:
//! the download cache (source tree, shared across targets), and per-target
//! build and prebuilt caches. A directory is trusted only when its status
//! record carries the fingerprint of the current specification.
//!
//! # Fingerprints
//!
//! | Purpose | Covers | Changes when |
//! |---------|--------|--------------|
//! | Download | name, version, source | anything affecting source acquisition changes |
//! | Build | the whole spec | anything changes, including build/export commands |
//!
//! Status records are written last, as a commit marker, never speculatively.

pub mod layout;
pub mod ledger;

pub use layout::{DirKind, Layout};
pub use ledger::{Purpose, StatusRecord, STATUS_FILE};
