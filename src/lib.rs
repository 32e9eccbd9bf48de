//! Points the `CodeUri` of a SAM function at a per-region S3 bucket while
//! keeping CloudFormation intrinsic tags such as `!FindInMap` and `!Ref`
//! intact.

pub mod cfn_yaml;
pub mod config;
pub mod errors;
pub mod fs;
pub mod patcher;
pub mod regions;

pub use cfn_yaml::{Document, Node, Scalar, Tag};
pub use config::UpdateConfig;
pub use errors::{Error, Result};
pub use patcher::{ensure_region_mapping, patch_code_uri, render_update, update_template};
pub use regions::RegionEntry;
