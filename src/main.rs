use batch_tts::args::Args;
use batch_tts::batch;
use batch_tts::tts::PollyCli;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("Text to speech using AWS Polly");

    let polly = Arc::new(PollyCli {
        program: args.aws.clone(),
        sample_rate: args.sample_rate,
    });

    let summary = match batch::run(&args, polly).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };
    if let (Some(path), Some(seconds)) = (&summary.combined, summary.combined_seconds) {
        info!("Combined audio written to {} ({:.2}s)", path.display(), seconds);
    }
}
