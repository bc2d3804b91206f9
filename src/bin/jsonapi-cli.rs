use clap::{Parser, Subcommand};
use serde_json::Value;

use jsonapi::client::{Client, Request, Response};

#[derive(Parser)]
#[command(name = "jsonapi-cli")]
#[command(about = "Command line client for jsonapi servers", long_about = None)]
struct Cli {
    /// Server address (host:port, or :port for localhost)
    #[arg(short, long, default_value = "localhost:8080")]
    addr: String,

    /// Use https
    #[arg(long)]
    tls: bool,

    /// Bearer token sent with every request
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// GET a path
    Get { path: String },
    /// POST a JSON body to a path
    Post { path: String, body: String },
    /// PUT a JSON body to a path
    Put { path: String, body: String },
    /// DELETE a path
    Delete { path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut client = Client::new(cli.addr);
    if cli.tls {
        client.use_tls();
    }
    if let Some(token) = cli.token {
        let value = format!("Bearer {token}");
        client.set_auth_fn(move |r: &mut Request| {
            r.set_header("authorization", value.as_str());
        });
    }

    let res = match cli.command {
        Commands::Get { path } => client.get(&path).await?,
        Commands::Post { path, body } => client.post(&path, &parse_body(&body)?).await?,
        Commands::Put { path, body } => client.put(&path, &parse_body(&body)?).await?,
        Commands::Delete { path } => client.delete(&path).await?,
    };

    print_response(&res)
}

fn parse_body(body: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(body)
}

fn print_response(res: &Response) -> Result<(), Box<dyn std::error::Error>> {
    if !res.is_success() {
        let err = res.api_error();
        eprintln!("Error: server returned status {}", res.status());
        eprintln!("Response: {}", err.message);
        std::process::exit(1);
    }

    let json: Value = res.read_json()?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
