//! Utility functions shared by the analysis pipeline.
//!
//! ## Components
//!
//! - **Hashing**: SHA-256 of file content for `hash_files` comparison
//! - **JSON**: persisting snapshots, per-run diffs and reports
//!
//! ```no_run
//! use rust_sandroid::utils::hash::sha256_hex;
//!
//! let digest = sha256_hex(b"ground truth");
//! println!("SHA-256: {}", digest);
//! ```

/// Cryptographic hash calculation utilities
pub mod hash;

/// JSON persistence helpers
pub mod json;
