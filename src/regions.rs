use crate::errors::{Error, Result};
use lazy_static::lazy_static;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const BUCKET_PREFIX: &str = "unified-logging-lambda-code-";

lazy_static! {
    /// Regions the log forwarder code bucket is replicated to. Order is the
    /// order entries appear in the generated mapping table.
    pub static ref DEFAULT_REGIONS: Vec<&'static str> = vec![
        "us-east-1",
        "us-east-2",
        "us-west-1",
        "us-west-2",
        "af-south-1",
        "ap-east-1",
        "ap-south-1",
        "ap-south-2",
        "ap-southeast-1",
        "ap-southeast-2",
        "ap-southeast-3",
        "ap-southeast-4",
        "ap-southeast-5",
        "ap-northeast-1",
        "ap-northeast-2",
        "ap-northeast-3",
        "ca-central-1",
        "ca-west-1",
        "eu-central-1",
        "eu-central-2",
        "eu-west-1",
        "eu-west-2",
        "eu-west-3",
        "eu-south-1",
        "eu-south-2",
        "eu-north-1",
        "il-central-1",
        "me-south-1",
        "me-central-1",
        "sa-east-1",
    ];
}

/// One row of the region to bucket mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEntry {
    pub region: String,
    pub bucket: String,
}

impl RegionEntry {
    pub fn new(region: impl Into<String>, bucket: impl Into<String>) -> Self {
        RegionEntry {
            region: region.into(),
            bucket: bucket.into(),
        }
    }

    pub fn for_region(region: &str, prefix: &str) -> Self {
        RegionEntry::new(region, format!("{}{}", prefix, region))
    }
}

pub fn default_entries(prefix: &str) -> Vec<RegionEntry> {
    DEFAULT_REGIONS
        .iter()
        .map(|region| RegionEntry::for_region(region, prefix))
        .collect()
}

/// Reads region entries from a JSON file. Accepts either a list of region
/// codes, whose bucket names are derived from `prefix`, or an object mapping
/// region codes to bucket names.
pub fn load_entries(path: &Path, prefix: &str) -> Result<Vec<RegionEntry>> {
    let bytes = std::fs::read(path).map_err(|source| Error::NotFound {
        path: path.to_path_buf(),
        source,
    })?;
    let content = String::from_utf8(bytes).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        location: None,
        reason: format!("regions file is not valid UTF-8: {}", e.utf8_error()),
    })?;
    parse_entries(&content, prefix).map_err(|e| e.with_path(path))
}

fn parse_entries(content: &str, prefix: &str) -> Result<Vec<RegionEntry>> {
    let invalid = |reason: String| Error::Parse {
        path: PathBuf::new(),
        location: None,
        reason,
    };

    let value: Value = serde_json::from_str(content).map_err(|e| Error::Parse {
        path: PathBuf::new(),
        location: Some(crate::cfn_yaml::Location::new(e.line(), e.column())),
        reason: e.to_string(),
    })?;

    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item.as_str() {
                Some(region) => Ok(RegionEntry::for_region(region, prefix)),
                None => Err(invalid(format!("region code must be a string, got {}", item))),
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(region, bucket)| match bucket.as_str() {
                Some(bucket) => Ok(RegionEntry::new(region.as_str(), bucket)),
                None => Err(invalid(format!(
                    "bucket for {} must be a string, got {}",
                    region, bucket
                ))),
            })
            .collect(),
        other => Err(invalid(format!(
            "expected a list of regions or a region to bucket object, got {}",
            other
        ))),
    }
}
