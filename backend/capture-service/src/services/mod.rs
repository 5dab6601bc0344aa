/// Service layer for the capture pipeline
///
/// This module provides business logic for:
/// - Capture orchestration: channels, synthesis and composite
/// - Channel persistence: stat, thumbnail, record, audit
/// - Thumbnail encoding and the synthesis client
/// - Reading stored files back by record id
/// - Time-derived identifiers
pub mod capture;
pub mod files;
pub mod identifiers;
pub mod persister;
pub mod synthesis;
pub mod thumbnail;

#[cfg(test)]
pub(crate) mod fakes;

pub use capture::CaptureOrchestrator;
pub use files::{FileContent, FileReader};
pub use identifiers::{Clock, FixedClock, ImageNumberGenerator, SystemClock};
pub use persister::{ChannelPersister, PersistedFile, RecordKind};
pub use synthesis::{HttpSynthesisClient, SynthesisRequest, Synthesizer};
pub use thumbnail::{ThumbnailCodec, ThumbnailConfig};
