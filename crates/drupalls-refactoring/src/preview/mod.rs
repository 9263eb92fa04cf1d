//! Previews of change-sets as unified diffs

pub mod generator;

pub use generator::{ChangeSetPreview, FilePreview, PreviewGenerator};
