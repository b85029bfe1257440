use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::instrument;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rmirror",
    version,
    about = "Mirror directory trees into destination trees, optionally copying only matching files",
    long_about = "`rmirror` copies every file of each configured source tree to the same relative path under \
the matching destination tree, creating destination directories as needed.

It is a one-way, copy-only mirror: existing destination files are overwritten and nothing is ever \
deleted from the destination.

Tasks come either from a TOML task table (--config) or from a single SRC DST pair. For each \
successfully copied file a line `copied: <name>` is printed to stdout.

Filtered tasks copy only entries whose file name matches the filter pattern (default: \
'^fl_\\w*\\.(h|cpp)$'). By default filtering is a flat name test, so subdirectories of a filtered \
tree are never entered; --filter-files-only (or `filter-applies-to-files-only = true` in the \
task table) descends into every subdirectory and tests only file names.

EXAMPLES:
    # Mirror one tree
    rmirror /repos/app/tests /mirror/app/tests

    # Mirror only fl_*.h / fl_*.cpp files at the top of a tree
    rmirror --filtered /repos/app/src /mirror/app/src

    # Run a task table
    rmirror --config mirror.toml --summary"
)]
struct Args {
    // Task selection
    /// TOML task table with one [[task]] entry per mirror task
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with_all = ["src", "dst", "filtered"],
        help_heading = "Tasks"
    )]
    config: Option<std::path::PathBuf>,

    /// Copy only entries whose name matches the filter pattern
    #[arg(long, help_heading = "Tasks")]
    filtered: bool,

    /// Descend into subdirectories of a filtered tree and apply the pattern to files only
    #[arg(long, requires = "filtered", help_heading = "Tasks")]
    filter_files_only: bool,

    /// Regular expression file names must match in filtered tasks (overrides the task table)
    #[arg(long, value_name = "REGEX", help_heading = "Tasks")]
    filter_pattern: Option<String>,

    /// Exit on first error
    #[arg(short = 'e', long = "fail-early", help_heading = "Tasks")]
    fail_early: bool,

    // Progress & output
    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Quiet mode, don't print copy notifications or report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Performance & throttling
    /// Maximum number of open files, 0 means no limit, leaving unspecified means using 80% of max open files system limit
    #[arg(long, value_name = "N", help_heading = "Performance & throttling")]
    max_open_files: Option<usize>,

    /// Maximum number of filesystem requests (list, stat, mkdir) in flight at once, 0 means no limit
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Performance & throttling"
    )]
    max_in_flight: usize,

    /// Throttle the number of directory entries processed per second, 0 means no throttle
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Performance & throttling"
    )]
    ops_throttle: usize,

    // Advanced settings
    /// Number of worker threads, 0 means number of cores
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Number of blocking worker threads, 0 means Tokio runtime default (512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,

    // ARGUMENTS
    /// Source directory
    #[arg(required_unless_present = "config")]
    src: Option<std::path::PathBuf>,

    /// Destination directory
    #[arg(required_unless_present = "config")]
    dst: Option<std::path::PathBuf>,
}

fn task_table(args: &Args) -> Result<common::MirrorConfig> {
    let mut config = match (&args.config, &args.src, &args.dst) {
        (Some(path), _, _) => common::MirrorConfig::from_file(path)?,
        (None, Some(src), Some(dst)) => common::MirrorConfig::new(vec![common::MirrorTask {
            source: src.clone(),
            destination: dst.clone(),
            filtered: args.filtered,
            filter_applies_to_files_only: args.filter_files_only,
        }]),
        _ => return Err(anyhow!("either --config or both SRC and DST must be given")),
    };
    if args.filter_pattern.is_some() {
        config.filter_pattern = args.filter_pattern.clone();
    }
    config.validate()?;
    Ok(config)
}

#[instrument]
async fn async_main(args: Args) -> Result<common::Summary> {
    let config = task_table(&args)?;
    let settings = common::Settings {
        fail_early: args.fail_early,
        transfer: common::transfer::Settings {
            notify: !args.quiet,
        },
    };
    // common::Error already renders its whole chain
    let summary = common::mirror(&config, &settings)
        .await
        .map_err(|error| anyhow!("{error}"))?;
    Ok(summary)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    let throttle = common::ThrottleConfig {
        max_open_files: args.max_open_files,
        max_in_flight: args.max_in_flight,
        ops_throttle: args.ops_throttle,
    };
    let res = common::run(output, runtime, throttle, func);
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
