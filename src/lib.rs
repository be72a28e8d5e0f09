//! photo-tidy: find perceptual duplicates, reconcile and tidy photo folders.

pub mod compare;
pub mod dedupe;
pub mod dropbox;
pub mod error;
pub mod flatten;
pub mod fsops;
pub mod hash;
pub mod metadata;
pub mod mirror;
pub mod report;
pub mod scanner;
pub mod types;
