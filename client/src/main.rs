use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};
use shared::{protocol, ClientMessage, Config, DaemonMessage, Speaker};
use std::path::PathBuf;
use std::time::{Duration, UNIX_EPOCH};
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "intake-client")]
#[command(about = "Drive the voice complaint intake daemon")]
struct Args {
    #[arg(short, long)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start listening and greet the caller
    Activate,
    /// Stop listening and cut off any speech
    Deactivate,
    /// Speak a phrase into the simulated microphone
    Say { text: Vec<String> },
    /// Send a typed chat message
    Type { text: Vec<String> },
    /// Throw away the current draft and start over
    Restart,
    Status,
    /// Print transcript, listening and case updates as they happen
    Follow,
    Shutdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = Config::load()?;
    let socket_path = args.socket.unwrap_or(config.ipc.socket_path);
    let timeout = Duration::from_secs(config.ipc.timeout_seconds);

    let mut stream = UnixStream::connect(&socket_path)
        .await
        .with_context(|| format!("Daemon not available at {:?}", socket_path))?;
    info!("Connected to {:?}", socket_path);

    let message = match args.command {
        Command::Activate => ClientMessage::Activate,
        Command::Deactivate => ClientMessage::Deactivate,
        Command::Say { text } => ClientMessage::Say(text.join(" ")),
        Command::Type { text } => ClientMessage::Type(text.join(" ")),
        Command::Restart => ClientMessage::RestartConversation,
        Command::Status => ClientMessage::GetStatus,
        Command::Follow => ClientMessage::Subscribe,
        Command::Shutdown => ClientMessage::Shutdown,
    };
    let follow = matches!(message, ClientMessage::Subscribe);

    protocol::send_message(&mut stream, &message).await?;
    let response = tokio::time::timeout(timeout, protocol::receive_message::<_, DaemonMessage>(&mut stream))
        .await
        .context("Timed out waiting for the daemon")??;
    print_message(&response);

    if let DaemonMessage::Error(error) = response {
        anyhow::bail!("Daemon error: {}", error);
    }

    if follow {
        loop {
            let update = protocol::receive_message::<_, DaemonMessage>(&mut stream).await?;
            debug!("Update: {:?}", update);
            print_message(&update);
        }
    }

    Ok(())
}

fn print_message(message: &DaemonMessage) {
    match message {
        DaemonMessage::Ack => {}
        DaemonMessage::ListeningChanged(true) => println!("[listening]"),
        DaemonMessage::ListeningChanged(false) => println!("[stopped listening]"),
        DaemonMessage::Transcript(entry) => {
            let seconds = entry
                .timestamp
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            let speaker = match entry.speaker {
                Speaker::User => "you",
                Speaker::Assistant => "bot",
            };
            println!("{} {:>3}: {}", seconds, speaker, entry.text);
        }
        DaemonMessage::CaseSubmitted(complaint) => println!(
            "[case {}] {} at {} ({} urgency): {}",
            complaint.case_id,
            complaint.issue_type,
            complaint.location,
            complaint.urgency,
            complaint.description
        ),
        DaemonMessage::Error(error) => eprintln!("error: {}", error),
        DaemonMessage::Status(status) => {
            println!("listening:       {}", status.listening);
            println!("step:            {} ({:?})", status.cursor.index(), status.cursor);
            println!("transcript:      {} entries", status.transcript_len);
            println!("cases submitted: {}", status.cases_submitted);
            println!("uptime:          {:?}", status.uptime);
        }
    }
}
