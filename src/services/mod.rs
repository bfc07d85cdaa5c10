//! Service layer for the directory.
//!
//! - Slug resolution (`SlugIndex`)
//! - County derivation (`CountyEnricher`)
//! - Refresh gating (`RefreshController`)
//! - Composition root (`Directory`)

mod county;
mod directory;
mod refresh;
mod slug_index;

pub use county::CountyEnricher;
pub use directory::Directory;
pub use refresh::{RefreshController, RefreshOutcome, RefreshStatus, SkipReason};
pub use slug_index::{SlugEntry, SlugIndex};
