use bucketsync_lib::commands;
use bucketsync_lib::logging::init_logging;
use bucketsync_lib::AppState;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "bucketsync")]
#[command(version)]
#[command(about = "Upload new and changed files from a local directory to an S3 bucket")]
struct Cli {
    /// Path to config.json (defaults to the per-user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Target bucket, overrides the config file and BUCKETSYNC_BUCKET
    #[arg(short, long, global = true)]
    bucket: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report the sync state of every file without uploading
    Scan {
        /// Directory to scan (defaults to targetPath from config)
        path: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Upload files that are missing or changed in the bucket
    Sync {
        /// Directory to sync (defaults to targetPath from config)
        path: Option<PathBuf>,

        /// Only report what would be uploaded
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Do not descend into subdirectories
        #[arg(long)]
        no_recursive: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List object keys in the bucket
    List,

    /// Download one object to a local path
    Download {
        /// Object key
        key: String,

        /// Local destination file
        dest: PathBuf,
    },

    /// Show the effective configuration, or persist a default bucket
    Config {
        /// Store this bucket as the default in the config file
        #[arg(long)]
        set_bucket: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut state = match AppState::load(cli.config.clone(), cli.bucket.clone()) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // 初始化日志系统，guard 必须活到 main 结束
    let _guard = init_logging(&state.config.log, cli.verbose);

    let result = match cli.command {
        Commands::Scan { path, json } => commands::sync::scan(&state, path, json).await,
        Commands::Sync {
            path,
            dry_run,
            no_recursive,
            json,
        } => commands::sync::sync(&state, path, dry_run, no_recursive, json).await,
        Commands::List => commands::storage::list(&state).await,
        Commands::Download { key, dest } => commands::storage::download(&state, &key, &dest).await,
        Commands::Config { set_bucket } => match set_bucket {
            Some(bucket) => commands::config::set_bucket(&mut state, &bucket),
            None => commands::config::show(&state),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
