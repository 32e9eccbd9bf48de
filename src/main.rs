use cfn_codeuri_patcher::config::{self, UpdateConfig};
use cfn_codeuri_patcher::{patcher, regions, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod output;

/// Point the CodeUri of the log forwarder function at the per-region code
/// bucket and write the region to bucket mapping table.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Template to update in place
    #[arg(default_value = config::TEMPLATE_PATH)]
    template: PathBuf,

    /// Logical ID of the function whose CodeUri is replaced
    #[arg(long, default_value = config::RESOURCE_NAME)]
    resource: String,

    /// S3 key of the deployment package
    #[arg(long, default_value = config::OBJECT_KEY)]
    object_key: String,

    /// Mapping table the bucket is looked up in
    #[arg(long, default_value = patcher::DEFAULT_TABLE)]
    mapping_table: String,

    /// Bucket names are this prefix followed by the region code
    #[arg(long, default_value = regions::BUCKET_PREFIX)]
    bucket_prefix: String,

    /// JSON file with a list of regions or a region to bucket object
    #[arg(long, conflicts_with = "no_region_mapping")]
    regions_file: Option<PathBuf>,

    /// Only patch CodeUri, leave Mappings alone
    #[arg(long)]
    no_region_mapping: bool,

    /// Print the updated template instead of writing it
    #[arg(long)]
    dry_run: bool,

    /// More log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn update_config(&self) -> Result<UpdateConfig> {
        let region_entries = if self.no_region_mapping {
            Vec::new()
        } else if let Some(path) = &self.regions_file {
            regions::load_entries(path, &self.bucket_prefix)?
        } else {
            regions::default_entries(&self.bucket_prefix)
        };

        Ok(UpdateConfig {
            template: self.template.clone(),
            resource_name: self.resource.clone(),
            mapping_table: self.mapping_table.clone(),
            object_key: self.object_key.clone(),
            region_entries,
        })
    }
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(err) = run(&args) {
        output::failure(&err);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.update_config()?;

    if args.dry_run {
        print!("{}", config.render()?);
        return Ok(());
    }

    config.apply()?;
    output::success(&format!(
        "Template file updated successfully: {}",
        config.template.display()
    ));
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
