pub mod assets;
pub mod orchestrator;
pub mod pipeline;

pub use assets::{AssetKind, AssetStore, FsAssetStore, MemoryAssetStore, NullAssetStore};
pub use orchestrator::{RequestOrchestrator, Transport};
pub use pipeline::{process_image, ProcessedImage};
