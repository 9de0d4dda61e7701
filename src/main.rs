use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use xsslint::server::LspServer;

#[derive(Parser, Debug)]
#[command(name = "xsslint")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "LSP server flagging possible XSS flows in Python code")]
struct Args {
    /// Use stdio transport (the default and only transport; accepted for
    /// compatibility with editors that always pass it)
    #[arg(long)]
    stdio: bool,

    /// Enable verbose logging (to stderr)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging to stderr (stdout is for the LSP protocol)
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        "xsslint {} starting (stdio flag: {})",
        env!("CARGO_PKG_VERSION"),
        args.stdio
    );

    let server = LspServer::new();
    server.run().await
}
