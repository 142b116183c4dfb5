use pget_core::logging;

mod cli;

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(err) = cli::run_from_args().await {
        eprintln!("pget error: {:#}", err);
        std::process::exit(1);
    }
}
