use clap::Parser;
use std::env;
use taxplan::api::{Cli, run_cli, run_http_server};

#[tokio::main]
async fn main() {
    env_logger::init();

    let raw_args: Vec<String> = env::args().collect();
    if raw_args.get(1).map(|s| s.as_str()) == Some("serve") {
        let port = raw_args
            .get(2)
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);
        if let Err(e) = run_http_server(port).await {
            eprintln!("Server error: {e}");
            std::process::exit(1);
        }
        return;
    }

    let cli = Cli::parse();
    // The solve is synchronous; run it off the async workers.
    match tokio::task::spawn_blocking(move || run_cli(cli)).await {
        Ok(Ok(output)) => print!("{output}"),
        Ok(Err(e)) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
