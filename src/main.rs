// src/main.rs

use extract_trigger::errors::EXIT_UNEXPECTED_ERROR;
use extract_trigger::{cli, logging, run};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("extract-trigger error: {err:?}");
        std::process::exit(EXIT_UNEXPECTED_ERROR);
    }

    if let Err(err) = run(args).await {
        eprintln!("extract-trigger error: {err}");
        std::process::exit(err.exit_code());
    }
}
