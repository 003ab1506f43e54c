use std::collections::HashMap;
use std::path::PathBuf;

/// The classes of decoration the pipeline can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// Status-bar overlay strip, keyed by status-bar style.
    Overlay,
    /// Device bezel composited around a processed screenshot.
    Frame,
    /// TrueType font for the status-bar clock.
    Font,
}

/// Read-only resolver from symbolic asset name to raw bytes.
///
/// Absence is a normal, handled case (`None`), never an error: the pipeline
/// has a documented fallback for every asset it asks for.
pub trait AssetStore {
    fn resolve(&self, kind: AssetKind, key: &str) -> Option<Vec<u8>>;
}

/// Asset store over a static directory:
/// `overlays/<key>.png`, `frames/<key>.png`, `fonts/<key>.ttf`.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, kind: AssetKind, key: &str) -> PathBuf {
        match kind {
            AssetKind::Overlay => self.root.join("overlays").join(format!("{key}.png")),
            AssetKind::Frame => self.root.join("frames").join(format!("{key}.png")),
            AssetKind::Font => self.root.join("fonts").join(format!("{key}.ttf")),
        }
    }
}

impl AssetStore for FsAssetStore {
    fn resolve(&self, kind: AssetKind, key: &str) -> Option<Vec<u8>> {
        std::fs::read(self.path_for(kind, key)).ok()
    }
}

/// Store with no assets at all; every lookup takes the fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAssetStore;

impl AssetStore for NullAssetStore {
    fn resolve(&self, _kind: AssetKind, _key: &str) -> Option<Vec<u8>> {
        None
    }
}

/// In-memory store, for embedders and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetStore {
    entries: HashMap<(AssetKind, String), Vec<u8>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: AssetKind, key: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert((kind, key.into()), bytes);
    }
}

impl AssetStore for MemoryAssetStore {
    fn resolve(&self, kind: AssetKind, key: &str) -> Option<Vec<u8>> {
        self.entries.get(&(kind, key.to_string())).cloned()
    }
}
