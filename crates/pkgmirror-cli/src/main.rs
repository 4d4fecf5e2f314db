//! pkgmirror CLI - copy packages and their dependencies between feeds

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod error;
mod exit_codes;

use commands::mirror::MirrorArgs;

#[derive(Parser)]
#[command(name = "pkgmirror")]
#[command(author = "pkgmirror Contributors")]
#[command(version)]
#[command(about = "Mirror packages and their dependencies between package feeds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror a package, or every package of a manifest list, to a destination
    Mirror(MirrorArgs),
}

fn init_tracing(debug: bool) {
    let default = if debug { "pkgmirror=debug" } else { "pkgmirror=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = match cli.command {
        Commands::Mirror(args) => commands::mirror::run(args).await,
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
