use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use sluice_api::{Client, NewSession};
use sluice_channel::{Channel, ExecuteOptions, Output};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run a snippet of code on a Jupyter Server kernel and print its outputs.
#[derive(Parser)]
struct Args {
    /// Base URL of the Jupyter server.
    #[arg(long, default_value = "http://localhost:8888")]
    url: String,

    /// Authentication token.
    #[arg(long)]
    token: Option<String>,

    /// Kernel to run the code on.
    #[arg(long, default_value = "python3")]
    kernel: String,

    /// Websocket connect timeout, in seconds.
    #[arg(long, default_value_t = 30)]
    connect_timeout: u64,

    /// Give up on the execution after this many seconds.
    #[arg(long)]
    exec_timeout: Option<u64>,

    /// The code to execute.
    code: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut builder = Client::builder().base_url(&args.url);
    if let Some(token) = &args.token {
        builder = builder.token(token);
    }
    let client = builder.build().context("building api client")?;

    let session = client
        .sessions()
        .create(&NewSession::console("sluice", args.kernel.as_str()))
        .await
        .context("creating session")?;
    info!(session_id = %session.id, kernel_id = %session.kernel.id, "session ready");

    let ws_url = client.ws_url(&session.kernel.id, &session.id)?;
    let channel = Channel::connect(
        ws_url.as_str(),
        &session.id,
        Duration::from_secs(args.connect_timeout),
    )
    .await
    .context("connecting kernel channel")?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });
    if let Some(secs) = args.exec_timeout {
        let deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            deadline.cancel();
        });
    }

    let result = channel
        .execute(&args.code, ExecuteOptions::default(), cancel)
        .await;

    match &result {
        Ok(outputs) => print_outputs(outputs),
        Err(e) => {
            print_outputs(e.partial_outputs());
            eprintln!("execution failed: {e}");
        }
    }

    channel.close();
    client
        .sessions()
        .delete(&session.id)
        .await
        .context("deleting session")?;

    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_outputs(outputs: &[Output]) {
    for output in outputs {
        match output {
            Output::Stdout { data, .. } => print!("{data}"),
            Output::Stderr { data, .. } => eprint!("{data}"),
            Output::Result { data } => {
                if let Some(text) = data.get("text/plain").and_then(|v| v.as_str()) {
                    println!("{text}");
                } else {
                    println!("{}", serde_json::Value::Object(data.clone()));
                }
            }
            Output::Error {
                name,
                value,
                traceback,
            } => {
                eprintln!("{name}: {value}");
                if !traceback.is_empty() {
                    eprintln!("{traceback}");
                }
            }
        }
    }
}
