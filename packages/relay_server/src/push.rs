//! `relay push`: a minimal producer that loops image files into the relay.
//!
//! Useful for exercising viewers without a real camera attached.

use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::time::Duration;
use tokio_tungstenite::tungstenite;
use tracing::{info, warn};
use url::Url;

const UPLOAD_PATH: &str = "/api/v1/camera/upload/ws";
const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);
const MAX_FRAME_INTERVAL: Duration = Duration::from_secs(3600);

/// What ended a push session.
#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Ctrl+C
    Interrupted,
    /// Sent the requested number of frames
    Finished,
    /// The relay closed the connection
    ClosedByRelay,
}

pub struct PushOptions {
    pub url: String,
    pub robot_id: String,
    pub camera_id: String,
    pub fps: f64,
    pub files: Vec<PathBuf>,
    /// Stop after this many frames (None = loop forever)
    pub count: Option<u64>,
}

impl PushOptions {
    /// Upload endpoint under the relay base URL, ids percent-encoded.
    pub fn upload_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.url)
            .with_context(|| format!("Invalid relay URL: {}", self.url))?;
        let path = format!("{}{}", url.path().trim_end_matches('/'), UPLOAD_PATH);
        url.set_path(&path);
        url.query_pairs_mut()
            .clear()
            .append_pair("robot_id", &self.robot_id)
            .append_pair("camera_id", &self.camera_id);
        Ok(url)
    }

    fn frame_interval(&self) -> Duration {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Duration::from_secs(1);
        }
        Duration::try_from_secs_f64(1.0 / self.fps)
            .unwrap_or(MAX_FRAME_INTERVAL)
            .clamp(MIN_FRAME_INTERVAL, MAX_FRAME_INTERVAL)
    }
}

pub async fn push(options: PushOptions) -> Result<PushOutcome> {
    if options.files.is_empty() {
        bail!("no frame files given");
    }

    let mut frames = Vec::with_capacity(options.files.len());
    for path in &options.files {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read frame file: {}", path.display()))?;
        frames.push(data);
    }

    let url = options.upload_url()?;
    let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;
    let (mut ws_write, mut ws_read) = ws_stream.split();
    info!("Pushing {} frame file(s) to {}", frames.len(), url);

    let mut interval = tokio::time::interval(options.frame_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut sent = 0u64;

    let outcome = loop {
        if options.count.is_some_and(|limit| sent >= limit) {
            break PushOutcome::Finished;
        }

        tokio::select! {
            _ = interval.tick() => {
                let frame = &frames[(sent % frames.len() as u64) as usize];
                ws_write
                    .send(tungstenite::Message::Binary(frame.clone().into()))
                    .await
                    .context("Failed to send frame")?;
                sent += 1;
            }
            msg = ws_read.next() => {
                match msg {
                    Some(Ok(tungstenite::Message::Close(_))) | None => break PushOutcome::ClosedByRelay,
                    Some(Err(e)) => return Err(e).context("Relay connection failed"),
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break PushOutcome::Interrupted;
            }
        }
    };

    if outcome != PushOutcome::ClosedByRelay {
        if let Err(e) = ws_write.send(tungstenite::Message::Close(None)).await {
            warn!("Failed to close relay connection cleanly: {}", e);
        }
    }
    info!("Sent {} frames ({:?})", sent, outcome);
    Ok(outcome)
}
