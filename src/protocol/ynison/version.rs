//! Version stamps.
//!
//! Queue and status updates each carry a [`VersionStamp`] so the backend can
//! detect stale writes. Versions are drawn from a process-wide counter that
//! never repeats and never decreases. The counter is seeded from the wall
//! clock in microseconds, so versions also keep increasing across restarts.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use crate::util;

/// Last version handed out by [`next_version`].
static LAST_VERSION: AtomicU64 = AtomicU64::new(0);

/// Returns a version number greater than any returned before.
#[must_use]
pub fn next_version() -> u64 {
    let now = util::unix_micros();
    let advance = |last: u64| now.max(last.saturating_add(1));

    // `fetch_update` only fails if the closure returns `None`.
    match LAST_VERSION.fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
        Some(advance(last))
    }) {
        Ok(last) | Err(last) => advance(last),
    }
}

/// Version of a queue or status sub-state.
///
/// Integers are emitted as JSON numbers and accepted as numbers or decimal
/// strings.
#[serde_as]
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionStamp {
    pub device_id: String,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub version: u64,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub timestamp_ms: i64,
}

impl VersionStamp {
    /// A fresh stamp for an update issued by `device_id` now.
    #[must_use]
    pub fn next(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_owned(),
            version: next_version(),
            timestamp_ms: util::unix_millis(),
        }
    }
}
