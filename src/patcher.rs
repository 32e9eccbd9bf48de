use crate::cfn_yaml::{self, Document, Node, Scalar};
use crate::errors::{Error, Result};
use crate::regions::RegionEntry;
use std::path::Path;
use tracing::{debug, info, warn};

/// Second-level key of every row in the region mapping table.
pub const BUCKET_ATTRIBUTE: &str = "BucketArn";

/// Table name used when the bucket reference is not a `!FindInMap`.
pub const DEFAULT_TABLE: &str = "RegionToS3Bucket";

/// Points `Resources.<resource_name>.Properties.CodeUri` at an S3 object.
///
/// The existing value (a local path such as `src/`, a mapping, or nothing)
/// is replaced by `{Bucket: bucket_ref, Key: object_key}`. An existing
/// `CodeUri` keeps its position among the properties; a new one is appended.
/// Missing structure is never created: a template without the resource is
/// not the template this tool expects.
///
/// # Arguments
/// * `doc` - The loaded template
/// * `resource_name` - Logical ID of the serverless function
/// * `bucket_ref` - Node written as `Bucket`, usually a `!FindInMap`
/// * `object_key` - S3 key of the deployment package
pub fn patch_code_uri(
    doc: &mut Document,
    resource_name: &str,
    bucket_ref: Node,
    object_key: &str,
) -> Result<()> {
    let properties_path = ["Resources", resource_name, "Properties"];
    for depth in 1..=properties_path.len() {
        let path = &properties_path[..depth];
        if doc.root().get_path(path).and_then(Node::as_mapping).is_none() {
            return Err(Error::missing_path(path));
        }
    }

    if let Some(previous) = doc.root().get_path(&properties_path).and_then(|p| p.get("CodeUri")) {
        debug!(resource = resource_name, previous = ?previous, "replacing CodeUri");
    }

    let mut code_uri = Node::mapping();
    code_uri.insert("Bucket", bucket_ref);
    code_uri.insert("Key", Node::string(object_key));
    doc.set_entry(&properties_path, "CodeUri", code_uri, None)
}

/// Writes `Mappings.<table_name>` as `region -> {BucketArn: bucket}` rows in
/// the order given. An existing table is overwritten as a whole, so regions
/// dropped from `entries` disappear from the template. A missing `Mappings`
/// section is created in front of `Resources`.
pub fn ensure_region_mapping(
    doc: &mut Document,
    table_name: &str,
    entries: &[RegionEntry],
) -> Result<()> {
    let mut table = Node::mapping();
    for entry in entries {
        let mut row = Node::mapping();
        row.insert(BUCKET_ATTRIBUTE, Node::string(entry.bucket.as_str()));
        table.insert(&entry.region, row);
    }

    let root = doc
        .root()
        .as_mapping()
        .ok_or_else(|| Error::missing_path(&["Mappings"]))?;
    let has_section = match root.get(&Scalar::from("Mappings")) {
        None | Some(Node::Scalar(None, Scalar::Null)) => false,
        Some(Node::Mapping(..)) => true,
        Some(_) => return Err(Error::missing_path(&["Mappings"])),
    };

    if has_section {
        doc.set_entry(&["Mappings"], table_name, table, None)?;
    } else {
        let mut mappings = Node::mapping();
        mappings.insert(table_name, table);
        doc.set_entry(&[], "Mappings", mappings, Some("Resources"))?;
    }
    debug!(table = table_name, regions = entries.len(), "wrote region mapping");
    Ok(())
}

/// Loads the template at `path` and returns the text `update_template`
/// would write, without touching the file.
pub fn render_update(
    path: &Path,
    resource_name: &str,
    bucket_ref: &Node,
    object_key: &str,
    region_entries: &[RegionEntry],
) -> Result<String> {
    let mut doc = cfn_yaml::load(path)?;
    apply_update(&mut doc, resource_name, bucket_ref, object_key, region_entries)?;
    cfn_yaml::to_yaml_string(&doc).map_err(|e| e.with_path(path))
}

/// Load, patch `CodeUri`, write the region table when `region_entries` is
/// not empty, then atomically replace the file. The file is only replaced
/// once every earlier step has succeeded.
pub fn update_template(
    path: &Path,
    resource_name: &str,
    bucket_ref: &Node,
    object_key: &str,
    region_entries: &[RegionEntry],
) -> Result<()> {
    let mut doc = cfn_yaml::load(path)?;
    apply_update(&mut doc, resource_name, bucket_ref, object_key, region_entries)?;
    cfn_yaml::dump(&doc, path)?;
    info!(path = %path.display(), resource = resource_name, "updated template");
    Ok(())
}

fn apply_update(
    doc: &mut Document,
    resource_name: &str,
    bucket_ref: &Node,
    object_key: &str,
    region_entries: &[RegionEntry],
) -> Result<()> {
    patch_code_uri(doc, resource_name, bucket_ref.clone(), object_key)?;

    let table = referenced_table(bucket_ref);
    if !region_entries.is_empty() {
        ensure_region_mapping(doc, table.unwrap_or(DEFAULT_TABLE), region_entries)?;
    } else if let Some(table) = table {
        if doc.root().get_path(&["Mappings", table]).is_none() {
            warn!(
                table,
                "CodeUri looks up a mapping table the template does not define"
            );
        }
    }
    Ok(())
}

/// Name of the table a `!FindInMap [ Table, ... ]` node reads from.
fn referenced_table(bucket_ref: &Node) -> Option<&str> {
    match bucket_ref.tag() {
        Some(tag) if tag.name() == "FindInMap" => bucket_ref
            .as_sequence()
            .and_then(|items| items.first())
            .and_then(Node::as_str),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfn_yaml::{parse_cf_yaml, Tag};
    use crate::regions::{default_entries, BUCKET_PREFIX};

    const RESOURCE: &str = "NewRelicLogsServerlessLogForwarder";
    const KEY: &str = "new-relic-log-forwarder-folder/new-relic-log-forwarder.zip";

    const TEMPLATE: &str = r#"
Resources:
  NewRelicLogsServerlessLogForwarder:
    Type: AWS::Serverless::Function
    Properties:
      Handler: bootstrap
      CodeUri: src/
      Runtime: provided.al2023
  OtherFunction:
    Type: AWS::Serverless::Function
    Properties:
      CodeUri: other/
"#;

    fn bucket_ref() -> Node {
        Node::find_in_map(DEFAULT_TABLE, Node::reference("AWS::Region"), BUCKET_ATTRIBUTE)
    }

    fn template() -> Document {
        parse_cf_yaml(TEMPLATE).unwrap()
    }

    fn properties(doc: &Document) -> &Node {
        doc.root()
            .get_path(&["Resources", RESOURCE, "Properties"])
            .unwrap()
    }

    fn keys(node: &Node) -> Vec<&str> {
        node.as_mapping()
            .unwrap()
            .keys()
            .filter_map(Scalar::as_str)
            .collect()
    }

    #[test]
    fn test_patch_replaces_string_code_uri() {
        let mut doc = template();
        patch_code_uri(&mut doc, RESOURCE, bucket_ref(), KEY).unwrap();

        let code_uri = properties(&doc).get("CodeUri").unwrap();
        assert_eq!(code_uri.get("Bucket"), Some(&bucket_ref()));
        assert_eq!(code_uri.get("Key").and_then(Node::as_str), Some(KEY));
        assert_eq!(
            code_uri.get("Bucket").and_then(Node::tag),
            Some(&Tag::new("FindInMap"))
        );
    }

    #[test]
    fn test_patch_keeps_property_order() {
        let mut doc = template();
        patch_code_uri(&mut doc, RESOURCE, bucket_ref(), KEY).unwrap();
        assert_eq!(keys(properties(&doc)), vec!["Handler", "CodeUri", "Runtime"]);

        let text = doc.to_yaml_string().unwrap();
        let reloaded = parse_cf_yaml(&text).unwrap();
        assert_eq!(keys(properties(&reloaded)), vec!["Handler", "CodeUri", "Runtime"]);
    }

    #[test]
    fn test_patch_rewrites_only_the_code_uri_lines() {
        let mut doc = template();
        patch_code_uri(&mut doc, RESOURCE, bucket_ref(), KEY).unwrap();
        let text = doc.to_yaml_string().unwrap();

        let old = "      CodeUri: src/\n";
        let at = TEMPLATE.find(old).unwrap();
        assert!(text.starts_with(&TEMPLATE[..at]));
        assert!(text.ends_with(&TEMPLATE[at + old.len()..]));
        assert!(text.contains("      CodeUri: other/\n"));
    }

    #[test]
    fn test_patch_appends_missing_code_uri() {
        let mut doc = parse_cf_yaml(
            "Resources:\n  NewRelicLogsServerlessLogForwarder:\n    Properties:\n      Handler: bootstrap\n",
        )
        .unwrap();
        patch_code_uri(&mut doc, RESOURCE, bucket_ref(), KEY).unwrap();
        assert_eq!(keys(properties(&doc)), vec!["Handler", "CodeUri"]);

        let text = doc.to_yaml_string().unwrap();
        assert!(text.starts_with(
            "Resources:\n  NewRelicLogsServerlessLogForwarder:\n    Properties:\n      Handler: bootstrap\n      CodeUri:\n"
        ));
    }

    #[test]
    fn test_patch_flow_properties() {
        let mut doc = parse_cf_yaml(
            "Resources:\n  NewRelicLogsServerlessLogForwarder:\n    Properties: {Handler: bootstrap, CodeUri: src/}\n",
        )
        .unwrap();
        patch_code_uri(&mut doc, RESOURCE, bucket_ref(), KEY).unwrap();

        let reloaded = parse_cf_yaml(&doc.to_yaml_string().unwrap()).unwrap();
        assert_eq!(reloaded.root(), doc.root());
        assert_eq!(
            properties(&reloaded).get_path(&["CodeUri", "Bucket"]),
            Some(&bucket_ref())
        );
    }

    #[test]
    fn test_patch_leaves_other_resources_alone() {
        let before = template();
        let mut doc = before.clone();
        patch_code_uri(&mut doc, RESOURCE, bucket_ref(), KEY).unwrap();

        assert_eq!(
            doc.root().get_path(&["Resources", "OtherFunction"]),
            before.root().get_path(&["Resources", "OtherFunction"])
        );
        assert_eq!(
            properties(&doc).get("Handler"),
            properties(&before).get("Handler")
        );
    }

    #[test]
    fn test_patch_is_idempotent() {
        let mut once = template();
        patch_code_uri(&mut once, RESOURCE, bucket_ref(), KEY).unwrap();
        let first = once.to_yaml_string().unwrap();

        let mut twice = parse_cf_yaml(&first).unwrap();
        patch_code_uri(&mut twice, RESOURCE, bucket_ref(), KEY).unwrap();

        assert_eq!(once.root(), twice.root());
        assert_eq!(twice.to_yaml_string().unwrap(), first);
    }

    #[test]
    fn test_patch_missing_resources() {
        let mut doc = parse_cf_yaml("Parameters: {}\n").unwrap();
        let err = patch_code_uri(&mut doc, RESOURCE, bucket_ref(), KEY).unwrap_err();
        assert_eq!(err.to_string(), "Missing Resources in template");
    }

    #[test]
    fn test_patch_missing_resource() {
        let mut doc = parse_cf_yaml("Resources:\n  Other:\n    Properties: {}\n").unwrap();
        let err = patch_code_uri(&mut doc, RESOURCE, bucket_ref(), KEY).unwrap_err();
        match err {
            Error::MissingPath { path } => {
                assert_eq!(path, "Resources.NewRelicLogsServerlessLogForwarder")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_patch_missing_properties() {
        let mut doc = parse_cf_yaml(
            "Resources:\n  NewRelicLogsServerlessLogForwarder:\n    Type: AWS::Serverless::Function\n",
        )
        .unwrap();
        let err = patch_code_uri(&mut doc, RESOURCE, bucket_ref(), KEY).unwrap_err();
        match err {
            Error::MissingPath { path } => assert_eq!(
                path,
                "Resources.NewRelicLogsServerlessLogForwarder.Properties"
            ),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_ensure_mapping_creates_full_table() {
        let mut doc = template();
        ensure_region_mapping(&mut doc, DEFAULT_TABLE, &default_entries(BUCKET_PREFIX)).unwrap();

        let table = doc
            .root()
            .get_path(&["Mappings", DEFAULT_TABLE])
            .and_then(Node::as_mapping)
            .unwrap();
        assert_eq!(table.len(), 30);
        for (region, row) in table {
            let region = region.as_str().unwrap();
            assert_eq!(
                row.get(BUCKET_ATTRIBUTE).and_then(Node::as_str),
                Some(format!("unified-logging-lambda-code-{}", region).as_str())
            );
        }
    }

    #[test]
    fn test_ensure_mapping_goes_before_resources() {
        let mut doc = parse_cf_yaml("Description: x\nResources: {}\nOutputs: {}\n").unwrap();
        ensure_region_mapping(&mut doc, DEFAULT_TABLE, &[RegionEntry::new("us-east-1", "b")])
            .unwrap();
        assert_eq!(
            keys(doc.root()),
            vec!["Description", "Mappings", "Resources", "Outputs"]
        );

        let text = doc.to_yaml_string().unwrap();
        assert!(text.starts_with("Description: x\nMappings:\n"));
        assert!(text.ends_with("Resources: {}\nOutputs: {}\n"));
    }

    #[test]
    fn test_ensure_mapping_replaces_stale_entries() {
        let text = "Mappings:\n  Other:\n    k: {v: 1}\n  RegionToS3Bucket:\n    xx-old-1:\n      BucketArn: stale\n";
        let mut doc = parse_cf_yaml(text).unwrap();
        ensure_region_mapping(
            &mut doc,
            DEFAULT_TABLE,
            &[RegionEntry::new("us-east-1", "fresh")],
        )
        .unwrap();

        let mappings = doc.root().get("Mappings").unwrap();
        let table = mappings.get(DEFAULT_TABLE).and_then(Node::as_mapping).unwrap();
        assert_eq!(table.len(), 1);
        assert!(mappings.get("Other").is_some());

        let out = doc.to_yaml_string().unwrap();
        assert!(out.starts_with("Mappings:\n  Other:\n    k: {v: 1}\n  RegionToS3Bucket:\n"));
        assert!(!out.contains("stale"));
    }

    #[test]
    fn test_ensure_mapping_is_idempotent() {
        let entries = default_entries(BUCKET_PREFIX);
        let mut once = template();
        ensure_region_mapping(&mut once, DEFAULT_TABLE, &entries).unwrap();
        let first = once.to_yaml_string().unwrap();

        let mut twice = parse_cf_yaml(&first).unwrap();
        ensure_region_mapping(&mut twice, DEFAULT_TABLE, &entries).unwrap();
        assert_eq!(twice.to_yaml_string().unwrap(), first);
    }

    #[test]
    fn test_ensure_mapping_rejects_scalar_mappings() {
        let mut doc = parse_cf_yaml("Mappings: nope\n").unwrap();
        let err = ensure_region_mapping(&mut doc, DEFAULT_TABLE, &[]).unwrap_err();
        assert!(matches!(err, Error::MissingPath { .. }));
    }

    #[test]
    fn test_ensure_mapping_fills_null_mappings() {
        let mut doc = parse_cf_yaml("Mappings:\nResources: {}\n").unwrap();
        ensure_region_mapping(&mut doc, DEFAULT_TABLE, &[RegionEntry::new("us-east-1", "b")])
            .unwrap();
        assert!(doc
            .root()
            .get_path(&["Mappings", DEFAULT_TABLE])
            .is_some());
        assert_eq!(keys(doc.root()), vec!["Mappings", "Resources"]);

        let text = doc.to_yaml_string().unwrap();
        assert!(text.starts_with("Mappings:\n  RegionToS3Bucket:\n"));
        assert!(text.ends_with("Resources: {}\n"));
    }

    #[test]
    fn test_referenced_table() {
        assert_eq!(referenced_table(&bucket_ref()), Some(DEFAULT_TABLE));
        assert_eq!(referenced_table(&Node::reference("Bucket")), None);
        assert_eq!(referenced_table(&Node::string("my-bucket")), None);
    }
}
