//! The capture loop: read a frame, mirror it, recognize hands, publish.
//!
//! Runs cooperatively on the current-thread runtime; the per-tick sleep
//! is the yield point that lets the listener and connection tasks run.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use handbridge_core::{FrameProcessor, HandRecognizer};
use handbridge_hw::FrameSource;

use crate::hub::BroadcastHub;
use crate::preview::Preview;

/// Backoff after a failed camera read before trying again.
const READ_RETRY_DELAY_MS: u64 = 100;

pub struct Engine<S, R> {
    source: S,
    recognizer: R,
    processor: FrameProcessor,
    hub: BroadcastHub,
    preview: Option<Preview>,
    frame_interval: Duration,
    shutdown: Rc<Cell<bool>>,
}

impl<S: FrameSource, R: HandRecognizer> Engine<S, R> {
    pub fn new(
        source: S,
        recognizer: R,
        hub: BroadcastHub,
        preview: Option<Preview>,
        frame_interval: Duration,
        shutdown: Rc<Cell<bool>>,
    ) -> Self {
        Self {
            source,
            recognizer,
            processor: FrameProcessor::new(),
            hub,
            preview,
            frame_interval,
            shutdown,
        }
    }

    /// Run until the shutdown flag is set.
    ///
    /// Failed camera reads are skipped without consuming a sequence
    /// number; failed inference degrades to an empty frame record so
    /// clients keep receiving a steady stream.
    pub async fn run(mut self) {
        tracing::info!("capture loop started");

        while !self.shutdown.get() {
            let mut frame = match self.source.read() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!(error = %e, "frame read failed, retrying");
                    tokio::time::sleep(Duration::from_millis(READ_RETRY_DELAY_MS)).await;
                    continue;
                }
            };

            // Mirror before inference so the output matches what the
            // user sees of themselves.
            frame.mirror_horizontal();

            let hands = match self
                .recognizer
                .recognize(&frame.data, frame.width, frame.height)
            {
                Ok(hands) => hands,
                Err(e) => {
                    tracing::warn!(error = %e, "inference failed, publishing empty frame");
                    Vec::new()
                }
            };

            let result = self.processor.process(hands);
            match serde_json::to_string(&result) {
                Ok(payload) => {
                    let delivered = self.hub.publish(&payload);
                    tracing::trace!(
                        timestamp = result.timestamp,
                        num_hands = result.num_hands,
                        delivered,
                        "frame published"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to serialize frame record");
                }
            }

            if let Some(preview) = self.preview.as_mut() {
                preview.render(&frame, &result, self.hub.client_count());
                if preview.wants_close() {
                    tracing::info!("preview window closed, shutting down");
                    self.shutdown.set(true);
                }
            }

            tokio::time::sleep(self.frame_interval).await;
        }

        tracing::info!("capture loop stopped");
    }
}
