//! Content-addressed blob cache
//!
//! Downloaded files are stored by their SHA-256 digest, so any blob found
//! under a digest is byte-identical to any other blob ever stored under it.
//!
//! # Operations
//!
//! | Operation | Network | Notes |
//! |-----------|---------|-------|
//! | `cached` | never | existence check |
//! | `ensure` | on miss | verify-then-accept against an expected digest |
//! | `import_with_url` | always | accept-then-name, records origin URL |
//! | `sha256_by_origin_url` | never | `NotFound` if never imported |
//! | `blob_abs_path` | never | `NotFound` if not resident |

pub mod opener;
pub mod store;

pub use opener::{DefaultOpener, UrlOpener};
pub use store::{BlobInfo, Cache, OriginRecord};
