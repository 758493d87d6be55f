//! Log output format selection for the dispatch binaries.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output format used by the tracing subscriber.
///
/// Parsing is case-insensitive so `GENBOX_LOG_FORMAT=Compact` and
/// `--log-format compact` behave the same.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, flattened for log shippers.
    #[default]
    Json,
    /// Single-line human-readable events.
    Compact,
}

impl LogFormat {
    /// Returns `true` when events are emitted as machine-readable JSON.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}
