use anyhow::Result;
use clap::Parser;
use intake_daemon::Daemon;
use log::info;
use shared::Config;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "intake-daemon")]
#[command(about = "Voice complaint intake assistant")]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(socket) = args.socket {
        config.ipc.socket_path = socket;
    }

    info!("Starting intake daemon (locale {})", config.speech.locale);

    let daemon = Arc::new(Daemon::new(config));
    daemon.serve().await
}
