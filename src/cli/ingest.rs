//! `chatguard ingest`: replay a captured response stream.

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::core::chat_stream::{drive_stream, IngestState, StreamEvent};
use crate::core::message::Message;
use crate::core::sanitize::sanitize_api_response;

pub async fn run_ingest(file: Option<PathBuf>, html: bool) -> Result<(), Box<dyn Error>> {
    let reader: Box<dyn AsyncRead + Unpin + Send> = match file {
        Some(path) => Box::new(tokio::fs::File::open(&path).await.map_err(|err| {
            format!("Failed to open {}: {err}", path.display())
        })?),
        None => Box::new(tokio::io::stdin()),
    };

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let mut reply = Message::assistant_pending();
    let mut stdout = std::io::stdout();
    let mut write_error: Option<io::Error> = None;
    let state = drive_stream(ReaderStream::new(reader), &cancel_token, |event| {
        reply.apply(&event);
        if html || write_error.is_some() {
            return;
        }
        if let StreamEvent::Content(delta) = &event {
            // Nobody is reading (closed pipe); stop pulling from the source.
            if let Err(err) = write_delta(&mut stdout, delta) {
                write_error = Some(err);
                cancel_token.cancel();
            }
        }
    })
    .await;

    if let Some(err) = write_error {
        return Err(format!("Failed to write to stdout: {err}").into());
    }

    if html {
        println!("{}", sanitize_api_response(reply.content.as_str()));
    } else if !reply.content.is_empty() {
        println!();
    }

    match state {
        IngestState::Failed => {
            let message = reply.error.as_deref().unwrap_or("unknown error");
            eprintln!("❌ Stream failed: {message}");
            std::process::exit(1);
        }
        IngestState::Cancelled => {
            eprintln!("⚠️  Stream cancelled");
            std::process::exit(130);
        }
        IngestState::Done | IngestState::Reading => Ok(()),
    }
}

fn write_delta(out: &mut impl Write, delta: &str) -> io::Result<()> {
    out.write_all(delta.as_bytes())?;
    out.flush()
}
