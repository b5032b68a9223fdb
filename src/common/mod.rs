//! Shared utilities across upgrade-kit modules.

pub mod files;

pub use files::{
    copy_with_mode, ensure_parent_exists, files_identical, set_mode, sha256_file,
};
