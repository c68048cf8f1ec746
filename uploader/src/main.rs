/// Reel Uploader
///
/// Uploads one local video to Vimeo: asks the Reel broker for a tus upload
/// session, streams the file with progress, and cancels on Ctrl-C.
use std::path::PathBuf;

use clap::Parser;
use tracing::error;

use reel_shared::transfer_state::TransferEvent;
use reel_shared::tus::{TusClient, DEFAULT_CHUNK_SIZE};
use reel_uploader::file::SelectedFile;
use reel_uploader::orchestrator::UploadOrchestrator;
use reel_uploader::session_client::BrokerClient;
use reel_uploader::ui::{self, ProgressView};

#[derive(Parser, Debug)]
#[command(name = "reel-uploader")]
#[command(about = "Upload a video to Vimeo through the Reel broker")]
struct Args {
    /// Video file to upload
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Base URL of the Reel broker
    #[arg(long, env = "REEL_BROKER_URL", default_value = "http://localhost:3000")]
    broker_url: String,

    /// Bytes sent per PATCH request
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: u64,
}

enum Step {
    Event(Option<TransferEvent>),
    Interrupted,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Logs go to stderr so they don't tear the progress bar
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reel_uploader=warn,reel_shared=warn".into()),
        )
        .init();

    let args = Args::parse();

    let file = SelectedFile::open(&args.file).await?;
    println!("{}", ui::file_info(&file));
    let total = file.size;

    let mut orchestrator = UploadOrchestrator::new(
        BrokerClient::new(args.broker_url),
        TusClient::new(args.chunk_size),
    );
    orchestrator.select_file(file)?;

    if let Err(e) = orchestrator.start_upload().await {
        error!("Upload did not start: {}", e);
    }

    if orchestrator.is_uploading() {
        let view = ProgressView::new(total);
        // SIGINT is only trapped once a transfer is running; before that it
        // terminates the process as usual.
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        while orchestrator.is_uploading() {
            let step = tokio::select! {
                event = orchestrator.next_event() => Step::Event(event),
                _ = &mut ctrl_c => Step::Interrupted,
            };

            match step {
                Step::Event(Some(event)) => {
                    orchestrator.handle_event(event);
                    view.update(orchestrator.state());
                }
                Step::Event(None) => break,
                Step::Interrupted => {
                    orchestrator.cancel_upload();
                }
            }
        }

        view.finish(orchestrator.state());
    }

    if let Some(banner) = ui::banner(orchestrator.state()) {
        println!("{}", banner);
    }

    match orchestrator.outcome() {
        Ok(()) => Ok(()),
        Err(e) if e.is_cancellation() => std::process::exit(130),
        Err(_) => std::process::exit(1),
    }
}
