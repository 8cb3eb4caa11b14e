use clap::Parser;

use flocker_release::cli::{run, Cli};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    // clap's usage errors exit with its own code; the contract here is
    // exit 1 on any failure, 0 otherwise.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            if error.use_stderr() {
                std::process::exit(1);
            }
            // --help and --version are successful exits.
            std::process::exit(0);
        }
    };

    if let Err(error) = run(cli).await {
        eprintln!("flocker-release: {error}");
        std::process::exit(1);
    }
}
