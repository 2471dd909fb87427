//! Storage for downloaded images and JSON reports.
//!
//! ## Directory Structure
//!
//! ```text
//! {download.base_path}/
//! └── {target_dir}/
//!     └── 20240102_030405/       # timestamp sub-directory
//!         ├── p2895695254.jpg    # plain mode
//!         ├── original/          # watermark mode: downloads
//!         └── cleaned/           # watermark mode: provider output
//! ```

pub mod local;

// Re-export for convenience
pub use local::{LocalStorage, PendingFile};
