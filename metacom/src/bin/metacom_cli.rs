use std::time::Duration;

use clap::{Parser, Subcommand};
use metacom::{Client, ClientConfig, Transport};

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Server address.
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub host: String,

    /// Use `wss://` for the websocket. Without it the CLI connects over plain
    /// `ws://`; most deployed servers require this flag.
    #[arg(long, default_value_t = false)]
    pub secure: bool,

    /// Call timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the methods the server exposes for the given interfaces.
    Introspect {
        #[arg(required = true)]
        interfaces: Vec<String>,
    },
    /// Call one method and print its result.
    Call {
        interface: String,
        method: String,
        /// Arguments as a JSON object.
        #[arg(default_value = "{}")]
        args: String,
        /// Interface version.
        #[arg(long)]
        version: Option<String>,
        /// Transport for the call.
        #[arg(long, default_value = "socket")]
        transport: Transport,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = ClientConfig {
        host: args.host,
        secure: args.secure,
        timeout: args.timeout.map(Duration::from_secs),
        ..Default::default()
    };
    let client = match Client::connect(config).await {
        Ok(client) => client,
        Err(err) => {
            eprintln!("connect failed: {err}");
            std::process::exit(1);
        }
    };

    let result = match args.command {
        Command::Introspect { interfaces } => client
            .introspect(interfaces)
            .await
            .and_then(|rsp| Ok(serde_json::to_value(rsp)?)),
        Command::Call {
            interface,
            method,
            args,
            version,
            transport,
        } => match serde_json::from_str(&args) {
            Ok(args) => {
                client
                    .dispatcher(transport, &interface, version.as_deref())
                    .method(&method)
                    .call(args)
                    .await
            }
            Err(err) => Err(err.into()),
        },
    };

    match result {
        Ok(rsp) => println!(
            "{}",
            serde_json::to_string_pretty(&rsp).unwrap_or_else(|_| rsp.to_string())
        ),
        Err(err) => {
            eprintln!("request failed: {err}");
            std::process::exit(1);
        }
    }
}
