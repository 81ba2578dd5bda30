mod bridge;

use std::fmt;
use std::path::PathBuf;

use clap::Parser;
use netbridge_shared::{Error, InvokeStatus, Result};
use tracing_subscriber::EnvFilter;

use bridge::LoadedBridge;

#[derive(Parser)]
#[command(name = "netbridge")]
#[command(about = "Run a static method of a .NET plugin through the netbridge loader")]
struct Cli {
    /// Path to the netbridge loader library
    loader_path: PathBuf,
    /// Plugin assembly, absolute or relative to the current directory
    assembly_path: PathBuf,
    /// Fully qualified type name (e.g., "HILib.HiClass"), or a
    /// "Type:Method" descriptor (e.g., "HILib.HiClass:Entry1")
    type_name: String,
    /// Static method with the ComponentEntryPoint signature (e.g., "Entry1");
    /// ignored when TYPE_NAME is a descriptor
    method_name: Option<String>,
    /// Ignored
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    extra: Vec<String>,
    /// Log the call trace, including the loader's
    #[arg(short, long)]
    debug: bool,
}

/// The managed method to call.
#[derive(Debug, PartialEq, Eq)]
enum Target<'a> {
    Method { type_name: &'a str, method_name: &'a str },
    /// Passed to `runMethodDesc` as is.
    Descriptor(&'a str),
}

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Method {
                type_name,
                method_name,
            } => write!(f, "{}:{}", type_name, method_name),
            Target::Descriptor(desc) => write!(f, "{}", desc),
        }
    }
}

impl Cli {
    /// .NET type names never contain ':', so one in TYPE_NAME marks a descriptor.
    fn target(&self) -> Result<Target<'_>> {
        if self.type_name.contains(':') {
            return Ok(Target::Descriptor(&self.type_name));
        }
        match &self.method_name {
            Some(method_name) => Ok(Target::Method {
                type_name: &self.type_name,
                method_name,
            }),
            None => Err(Error::Other(format!(
                "Missing method name for type {}",
                self.type_name
            ))),
        }
    }

    fn ignored_args(&self) -> Vec<&str> {
        let method_slot = match self.target() {
            Ok(Target::Descriptor(_)) => self.method_name.as_deref(),
            _ => None,
        };
        method_slot
            .into_iter()
            .chain(self.extra.iter().map(String::as_str))
            .collect()
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli, target: &Target<'_>) -> Result<InvokeStatus> {
    let ignored = cli.ignored_args();
    if !ignored.is_empty() {
        tracing::debug!("Ignoring extra arguments: {:?}", ignored);
    }

    let bridge = LoadedBridge::load(&cli.loader_path)?;
    tracing::debug!("Loaded {}", bridge.path().display());

    let cwd = std::env::current_dir()?;
    let handle = bridge.init(&cli.assembly_path, Some(&cwd), cli.debug)?;
    tracing::info!("Registered {} as {}", cli.assembly_path.display(), handle);

    let status = match target {
        Target::Method {
            type_name,
            method_name,
        } => bridge.run_method(handle, type_name, method_name),
        Target::Descriptor(desc) => bridge.run_method_desc(handle, desc),
    };
    if !bridge.deinit(handle) {
        tracing::warn!("Runtime was already closed");
    }
    status
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let target = match cli.target() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match run(&cli, &target) {
        Ok(InvokeStatus::Ok) => {
            println!("{} completed", target);
        }
        Ok(status) => {
            eprintln!(
                "Error: {} failed with {:?} ({})",
                target,
                status,
                status.code()
            );
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
