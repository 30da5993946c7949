//! Shared plumbing for the tarn binaries.

pub mod common;
