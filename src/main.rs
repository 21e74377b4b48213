use std::env;

use growth::api::{ApiError, run_http_server, run_project_cli};

#[tokio::main]
async fn main() {
    env_logger::init();

    let raw_args: Vec<String> = env::args().collect();
    match raw_args.get(1).map(|s| s.as_str()) {
        Some("serve") => {
            let port = raw_args
                .get(2)
                .and_then(|s| s.parse::<u16>().ok())
                .unwrap_or(8080);
            if let Err(e) = run_http_server(port).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Some("project") => match run_project_cli(raw_args.iter().skip(1)) {
            Ok(json) => println!("{json}"),
            Err(ApiError::Args(e)) => e.exit(),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
        _ => {
            eprintln!("Usage: growth serve [port] | growth project [flags]");
            std::process::exit(1);
        }
    }
}
