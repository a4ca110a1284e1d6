//! repro-fetch - reproducible package fetcher
//!
//! Fetches OS packages by content hash rather than by name and version, so
//! a later installation is bit-identical regardless of when or from which
//! mirror it runs.
//!
//! - [`cache`]: content-addressed SHA-256 blob store
//! - [`downloader`]: fetch orchestrator with provider fallback
//! - [`manifest`]: `SHA256SUMS`-style hash manifests
//! - [`distro`]: package ecosystem drivers

pub mod cache;
pub mod cli;
pub mod config;
pub mod digest;
pub mod distro;
pub mod downloader;
pub mod error;
pub mod filespec;
pub mod manifest;
pub mod ui;
pub mod version;

pub use error::{ReproError, ReproResult};
