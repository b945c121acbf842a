// src/main.rs

use taskgraph::{cli, logging, run, TaskGraphError};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        match err.downcast_ref::<TaskGraphError>() {
            Some(e) => eprintln!("taskgraph error ({}): {e}", e.kind()),
            None => eprintln!("taskgraph error: {err:#}"),
        }
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
