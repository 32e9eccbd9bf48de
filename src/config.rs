use crate::cfn_yaml::Node;
use crate::errors::Result;
use crate::patcher::{self, BUCKET_ATTRIBUTE, DEFAULT_TABLE};
use crate::regions::{self, RegionEntry, BUCKET_PREFIX};
use std::path::PathBuf;

pub const TEMPLATE_PATH: &str = "lambda-template.yaml";
pub const RESOURCE_NAME: &str = "NewRelicLogsServerlessLogForwarder";
pub const OBJECT_KEY: &str = "new-relic-log-forwarder-folder/new-relic-log-forwarder.zip";

/// Everything a single template update needs.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateConfig {
    pub template: PathBuf,
    pub resource_name: String,
    pub mapping_table: String,
    pub object_key: String,
    /// Rows for the mapping table. Empty means the table is left alone.
    pub region_entries: Vec<RegionEntry>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        UpdateConfig {
            template: PathBuf::from(TEMPLATE_PATH),
            resource_name: RESOURCE_NAME.to_string(),
            mapping_table: DEFAULT_TABLE.to_string(),
            object_key: OBJECT_KEY.to_string(),
            region_entries: regions::default_entries(BUCKET_PREFIX),
        }
    }
}

impl UpdateConfig {
    /// `!FindInMap [ <mapping_table>, !Ref 'AWS::Region', BucketArn ]`
    pub fn bucket_ref(&self) -> Node {
        Node::find_in_map(
            &self.mapping_table,
            Node::reference("AWS::Region"),
            BUCKET_ATTRIBUTE,
        )
    }

    pub fn apply(&self) -> Result<()> {
        patcher::update_template(
            &self.template,
            &self.resource_name,
            &self.bucket_ref(),
            &self.object_key,
            &self.region_entries,
        )
    }

    /// The text `apply` would write.
    pub fn render(&self) -> Result<String> {
        patcher::render_update(
            &self.template,
            &self.resource_name,
            &self.bucket_ref(),
            &self.object_key,
            &self.region_entries,
        )
    }
}
