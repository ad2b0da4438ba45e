//! Download example
//!
//! Fetches metadata for a URL, then downloads it into a folder while
//! printing pipeline events. Ctrl-C cancels the running download.
//!
//! ```text
//! cargo run --example download -- <url> <destination> [--audio] [--quality <height>]
//! ```
//!
//! Set `RUST_LOG=vidpipe=debug` to see tool output.

use tracing_subscriber::EnvFilter;
use vidpipe::{Config, DownloadRequest, Event, Pipeline, Quality};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vidpipe=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let mut positional = Vec::new();
    let mut audio_only = false;
    let mut quality = Quality::Best;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--audio" => audio_only = true,
            "--quality" => {
                let height = args.next().ok_or("--quality needs a height")?;
                quality = Quality::MaxHeight(height.parse()?);
            }
            _ => positional.push(arg),
        }
    }
    let [url, destination] = <[String; 2]>::try_from(positional)
        .map_err(|_| "usage: download <url> <destination> [--audio] [--quality <height>]")?;

    let pipeline = Pipeline::new(Config::default())?;

    let meta = pipeline.fetch_metadata(&url).await?;
    println!("Title: {}", meta.title);
    for option in &meta.qualities {
        println!("  quality: {} ({})", option.label, option.value);
    }

    let mut events = pipeline.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::StateChanged { state } => println!("→ {}", state.name()),
                Event::Progress(p) => println!("  {:5.1}% {}", p.overall_percent, p.status_text),
                Event::Completed { path } => println!("✓ Saved {}", path.display()),
                Event::Failed { kind, detail } => println!("✗ {:?}: {}", kind, detail),
                Event::Cancelled => println!("✗ Cancelled"),
                Event::CleanupFailed { path, error } => {
                    println!("⚠ Could not remove {}: {}", path.display(), error)
                }
                Event::Shutdown => break,
            }
        }
    });

    let canceller = pipeline.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel().await;
        }
    });

    let mut request = DownloadRequest::new(url, destination).with_quality(quality);
    if audio_only {
        request = request.audio_only();
    }

    let result = pipeline.start_download(request).await;
    pipeline.shutdown().await;
    result?;

    Ok(())
}
