use chrono::Utc;
use photoforge_contracts::events::{EventLog, EventPayload};
use photoforge_contracts::{EditError, ImageConfiguration, SessionId, SessionStore};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::assets::AssetStore;
use crate::pipeline::{process_image, ProcessedImage};

/// The chat-side collaborator: where photos come from and where results go.
///
/// `resolve_image_bytes` is fallible and bounded; the deliver methods are
/// best-effort from the orchestrator's point of view.
pub trait Transport {
    fn resolve_image_bytes(&self, image_ref: &str) -> anyhow::Result<Vec<u8>>;
    fn deliver_document(&self, id: SessionId, bytes: &[u8], filename: &str) -> anyhow::Result<()>;
    fn deliver_text(&self, id: SessionId, text: &str) -> anyhow::Result<()>;
}

/// Glues a completed conversation to the pipeline and the transport.
///
/// Exactly one processing attempt per session: whatever happens, the session
/// is removed before `finalize` returns. No retry, no partial output.
pub struct RequestOrchestrator<'a> {
    store: &'a SessionStore,
    assets: &'a dyn AssetStore,
    transport: &'a dyn Transport,
    events: &'a EventLog,
}

impl<'a> RequestOrchestrator<'a> {
    pub fn new(
        store: &'a SessionStore,
        assets: &'a dyn AssetStore,
        transport: &'a dyn Transport,
        events: &'a EventLog,
    ) -> Self {
        Self {
            store,
            assets,
            transport,
            events,
        }
    }

    /// Runs the single processing attempt for a completed configuration.
    /// Failures are reported to the user and the event log, never raised.
    pub fn finalize(&self, id: SessionId, config: &ImageConfiguration, image_ref: &str) {
        let request_id = short_request_id(id);
        let _ = self.events.emit_for(
            id,
            "processing_started",
            payload(json!({
                "request_id": &request_id,
                "mode": config.mode.key(),
                "format": config.format.key(),
            })),
        );
        let _ = self.transport.deliver_text(id, "Processing your image...");

        match self.run_attempt(id, config, image_ref) {
            Ok(output) => {
                let _ = self.events.emit_for(
                    id,
                    "delivered",
                    payload(json!({
                        "request_id": &request_id,
                        "filename": &output.filename,
                        "bytes": output.bytes.len(),
                    })),
                );
                let _ = self
                    .transport
                    .deliver_text(id, "Done! Send another photo any time.");
            }
            Err(err) => {
                let _ = self.events.emit_for(
                    id,
                    "session_failed",
                    payload(json!({
                        "request_id": &request_id,
                        "error": err.to_string(),
                    })),
                );
                let _ = self
                    .transport
                    .deliver_text(id, &format!("Something went wrong: {err}"));
            }
        }

        self.store.remove(id);
    }

    fn run_attempt(
        &self,
        id: SessionId,
        config: &ImageConfiguration,
        image_ref: &str,
    ) -> Result<ProcessedImage, EditError> {
        let source = self
            .transport
            .resolve_image_bytes(image_ref)
            .map_err(|err| EditError::ResourceUnavailable(format!("{err:#}")))?;
        let output = process_image(&source, config, self.assets)?;
        self.transport
            .deliver_document(id, &output.bytes, &output.filename)
            .map_err(|err| EditError::ResourceUnavailable(format!("delivery failed: {err:#}")))?;
        Ok(output)
    }
}

fn payload(value: Value) -> EventPayload {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// Short deterministic id for correlating one processing attempt's events.
fn short_request_id(id: SessionId) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.0.to_be_bytes());
    hasher.update(Utc::now().timestamp_millis().to_be_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..4])
}
