//! Prelude for common imports used throughout all mobile-deck crates

pub use crate::error::{Error, Result};
pub use tracing::{debug, error, info, instrument, trace, warn};
