//! # fnkit-stamp
//!
//! Build-staleness cache for function source trees.
//!
//! [`fingerprint`] hashes a tree's relative paths and modification times
//! (contents are never read). [`stamp`] records the current fingerprint
//! after a successful build, and [`built`] / [`check`] compare a fresh
//! fingerprint against it.

pub mod error;
pub mod fingerprint;
pub mod staleness;
pub mod store;

pub use error::StampError;
pub use fingerprint::{fingerprint, Fingerprint};
pub use staleness::{built, check, StalenessSignal};
pub use store::{load, stamp, StampFile};
