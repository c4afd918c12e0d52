use clap::{Args, Subcommand};
use kresolve_config::{Config, ConfigBuilder, ConfigLoader, NamingStrategy};
use kresolve_core::{Error, DEFAULT_DEBOUNCE_MS};
use std::path::PathBuf;
use std::time::Duration;

pub mod apply;
pub mod resolve;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve image references and print the resulting manifests
    Resolve {
        #[command(flatten)]
        args: ResolveArgs,

        /// Write the resolved manifests to this file instead of stdout
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Resolve image references and stream the manifests into `kubectl apply`
    Apply {
        #[command(flatten)]
        args: ResolveArgs,

        /// kubectl binary to run
        #[arg(long, value_name = "PATH", default_value = "kubectl")]
        kubectl: PathBuf,

        /// Extra arguments passed to `kubectl apply` after `--`
        #[arg(last = true)]
        kubectl_args: Vec<String>,
    },
}

/// Flags shared by every command that resolves manifests
#[derive(Debug, Clone, Args)]
pub struct ResolveArgs {
    /// Manifest file, directory of manifests, or '-' for stdin (repeatable)
    #[arg(short = 'f', long = "filename", value_name = "PATH", required = true)]
    pub filenames: Vec<PathBuf>,

    /// Descend into subdirectories of directory inputs
    #[arg(short = 'R', long)]
    pub recursive: bool,

    /// Keep running and re-resolve manifests whose targets change
    #[arg(short = 'W', long)]
    pub watch: bool,

    /// Only keep documents whose labels match this selector
    #[arg(short = 'l', long, value_name = "SELECTOR")]
    pub selector: Option<String>,

    /// Only treat ko:// strings as build references
    #[arg(long)]
    pub strict: bool,

    /// Maximum number of concurrent builds (defaults to the number of CPUs)
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    pub jobs: Option<usize>,

    /// Maximum number of concurrent publishes (uncapped by default)
    #[arg(long, value_name = "N")]
    pub concurrent_publishes: Option<usize>,

    /// Destination repository (falls back to KRESOLVE_DOCKER_REPO)
    #[arg(long = "repo", value_name = "REPOSITORY")]
    pub repository: Option<String>,

    /// Also write artifacts into a local image layout at this path
    #[arg(long, value_name = "DIR")]
    pub oci_layout_path: Option<PathBuf>,

    /// How target keys become image names
    #[arg(long, value_name = "STRATEGY", default_value = "base-hash", value_parser = parse_naming)]
    pub naming: NamingStrategy,

    /// Tag recorded for every published image (repeatable)
    #[arg(short = 't', long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Directory build references are resolved against (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Quiet period in milliseconds that ends a burst of file changes
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_DEBOUNCE_MS)]
    pub debounce_ms: u64,
}

fn parse_naming(s: &str) -> Result<NamingStrategy, Error> {
    s.parse()
}

impl ResolveArgs {
    fn builder(&self) -> ConfigBuilder {
        let mut builder = Config::builder()
            .filenames(self.filenames.clone())
            .recursive(self.recursive)
            .watch(self.watch)
            .selector(self.selector.clone())
            .strict(self.strict)
            .concurrent_publishes(self.concurrent_publishes)
            .oci_layout_path(self.oci_layout_path.clone())
            .naming(self.naming)
            .tags(self.tags.clone())
            .debounce(Duration::from_millis(self.debounce_ms));

        if let Some(jobs) = self.jobs {
            builder = builder.concurrent_builds(jobs);
        }
        if let Some(root) = &self.root {
            builder = builder.root(root.clone());
        }
        builder
    }

    /// Loader combining these flags with the environment
    pub fn loader(&self) -> ConfigLoader {
        ConfigLoader::new(self.builder()).repository(self.repository.clone())
    }
}
