//! smbstream demo binary
//!
//! Exercises the streaming engine against a directory-backed share (a local
//! directory standing in for a mounted SMB share).
//!
//! # Usage
//!
//! ```bash
//! # List a directory as JSON
//! smbstream ls /mnt/share media/albums
//!
//! # Stream a file to stdout
//! smbstream cat /mnt/share media/movie.mkv > movie.mkv
//!
//! # Resume from a byte offset
//! smbstream cat /mnt/share media/movie.mkv 1048576 > tail.bin
//!
//! # With verbose logging
//! RUST_LOG=debug smbstream cat /mnt/share media/movie.mkv > /dev/null
//! ```
//!
//! # Environment Variables
//!
//! - `SMBSTREAM_BUDGET_CAPACITY`: memory ceiling in bytes
//! - `SMBSTREAM_CHUNK_MIN` / `SMBSTREAM_CHUNK_MAX` / `SMBSTREAM_CHUNK_INITIAL`
//! - `SMBSTREAM_POOL_CAPACITY` / `SMBSTREAM_POOL_MAX_BUFFER`
//! - `RUST_LOG`: log level (trace, debug, info, warn, error)
//!
//! # Signals
//!
//! - SIGINT: cancels the active stream and exits after cleanup

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::signal;
use tracing::{info, warn};

use smbstream_core::{EngineConfig, LocalDirClient, StreamEngine, StreamEventKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("smbstream_core=info".parse()?)
                .add_directive("smbstream=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let usage = "usage: smbstream <ls|cat> <share-root> [path] [offset]";

    let (command, root) = match (args.first(), args.get(1)) {
        (Some(command), Some(root)) => (command.as_str(), root.clone()),
        _ => bail!("{usage}"),
    };

    let config = EngineConfig::from_env();
    let client = Arc::new(LocalDirClient::new(root));
    let engine = StreamEngine::new(client, config).context("invalid configuration")?;
    info!(endpoint = %engine.connection_info(), "engine ready");

    match command {
        "ls" => {
            let path = args.get(2).map(String::as_str).unwrap_or("");
            let entries = engine.list_directory(path).await?;
            let json = serde_json::to_string_pretty(&entries)?;
            println!("{json}");
        }
        "cat" => {
            let path = args.get(2).context(usage)?.clone();
            let offset: u64 = match args.get(3) {
                Some(raw) => raw.parse().context("offset must be an integer")?,
                None => 0,
            };
            cat(&engine, &path, offset).await?;
        }
        other => bail!("unknown command {other:?}; {usage}"),
    }

    Ok(())
}

/// Stream one file to stdout, cancelling cleanly on SIGINT
async fn cat(engine: &StreamEngine, path: &str, offset: u64) -> anyhow::Result<()> {
    let mut handle = if offset > 0 {
        engine.seek_stream(path, offset, EngineConfig::default().chunk_initial)
    } else {
        engine.start_stream(path)
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    loop {
        tokio::select! {
            event = handle.events.recv() => {
                let Some(event) = event else { break };
                match event.kind {
                    StreamEventKind::Chunk { data, .. } => {
                        out.write_all(&data)?;
                    }
                    StreamEventKind::EndOfStream { bytes_delivered } => {
                        out.flush()?;
                        info!(bytes_delivered, "stream complete");
                        break;
                    }
                    StreamEventKind::Failed { kind, message } => {
                        bail!("stream failed [{kind}]: {message}");
                    }
                }
            }
            _ = signal::ctrl_c() => {
                warn!("interrupt received; cancelling stream");
                engine.cancel_stream(path);
                break;
            }
        }
    }

    // Release the receiver so a cancelled session blocked on delivery can
    // observe the detach and finish.
    drop(handle.events);
    let report = handle.completion.await?;
    info!(
        state = ?report.state,
        chunks = report.chunks_emitted,
        pressure = report.pressure_events,
        final_chunk_size = report.final_chunk_size,
        "session report"
    );
    Ok(())
}
