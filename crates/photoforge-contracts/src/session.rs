use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::choices::{Mode, OutputFormat, StatusBarStyle};
use crate::errors::EditError;

pub const DEFAULT_QUALITY: u8 = 85;

/// Chat-scoped identifier; stable for the life of one conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session {}", self.0)
    }
}

/// Where the conversation stands. Always derived from the session fields,
/// never stored, so the two can't disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingMode,
    AwaitingFormat,
    AwaitingCleanChoice,
    AwaitingStyle,
    Complete,
}

/// One user's in-flight edit request plus the choices gathered so far.
///
/// Exists only after a photo has been submitted; destroyed exactly once,
/// after the single processing attempt or on cancel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub image_ref: String,
    pub mode: Option<Mode>,
    pub format: Option<OutputFormat>,
    pub clean_status_bar: Option<bool>,
    pub status_bar_style: Option<StatusBarStyle>,
    pub mockup_device: Option<String>,
    pub quality: u8,
}

impl Session {
    pub fn new(id: SessionId, image_ref: impl Into<String>) -> Self {
        Self {
            id,
            image_ref: image_ref.into(),
            mode: None,
            format: None,
            clean_status_bar: None,
            status_bar_style: None,
            mockup_device: None,
            quality: DEFAULT_QUALITY,
        }
    }

    pub fn stage(&self) -> Stage {
        let Some(mode) = self.mode else {
            return Stage::AwaitingMode;
        };
        if self.format.is_none() {
            return Stage::AwaitingFormat;
        }
        if mode != Mode::Screenshot {
            return Stage::Complete;
        }
        match self.clean_status_bar {
            None => Stage::AwaitingCleanChoice,
            Some(false) => Stage::Complete,
            Some(true) => {
                if self.status_bar_style.is_some() {
                    Stage::Complete
                } else {
                    Stage::AwaitingStyle
                }
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stage() == Stage::Complete
    }

    /// Freezes the collected choices into the value object the pipeline
    /// consumes. Only valid once the conversation is complete.
    pub fn to_configuration(&self) -> Result<ImageConfiguration, EditError> {
        if !self.is_complete() {
            return Err(EditError::Incomplete);
        }
        Ok(ImageConfiguration {
            mode: self.mode.ok_or(EditError::Incomplete)?,
            format: self.format.ok_or(EditError::Incomplete)?,
            clean_status_bar: self.clean_status_bar.unwrap_or(false),
            status_bar_style: self.status_bar_style,
            mockup_device: self.mockup_device.clone(),
            quality: self.quality,
        })
    }
}

/// Immutable, completed configuration handed to the image pipeline.
/// The pipeline has no session awareness beyond this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConfiguration {
    pub mode: Mode,
    pub format: OutputFormat,
    pub clean_status_bar: bool,
    pub status_bar_style: Option<StatusBarStyle>,
    pub mockup_device: Option<String>,
    pub quality: u8,
}

impl ImageConfiguration {
    pub fn output_filename(&self) -> String {
        format!("edited.{}", self.format.extension())
    }
}

/// Arena of live sessions keyed by id.
///
/// The outer lock is held only to insert/find/remove an entry; each session
/// carries its own mutex, so overlapping events for one id are serialized
/// while unrelated ids never contend.
#[derive(Debug, Default, Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<SessionId, Arc<Mutex<Session>>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh session for `id`, replacing any in-flight one
    /// (a new photo always restarts the conversation).
    pub fn create(&self, id: SessionId, image_ref: impl Into<String>) {
        let session = Arc::new(Mutex::new(Session::new(id, image_ref)));
        self.lock_map().insert(id, session);
    }

    /// Runs `f` against the session for `id` under its per-session lock.
    pub fn with_session<T>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut Session) -> T,
    ) -> Result<T, EditError> {
        let entry = self
            .lock_map()
            .get(&id)
            .cloned()
            .ok_or(EditError::StaleSession(id))?;
        let mut session = entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(f(&mut session))
    }

    /// Removes the session if present; returns whether one existed.
    pub fn remove(&self, id: SessionId) -> bool {
        self.lock_map().remove(&id).is_some()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.lock_map().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_map().is_empty()
    }

    fn lock_map(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, Arc<Mutex<Session>>>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
