//! Shared value types of the VEAP data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker segment addressing the process value of a data point (`.../~pv`).
pub const PV_MARKER: &str = "~pv";
/// Marker segment addressing the history of a data point (`.../~hist`).
pub const HIST_MARKER: &str = "~hist";
/// Marker segment addressing the batch exchange service (`/~exgdata`).
pub const EXG_DATA_MARKER: &str = "~exgdata";
/// Marker segment addressing the query service (`/~query`).
pub const QUERY_MARKER: &str = "~query";

/// Property name carrying the links of an object on the wire.
pub const LINKS_MARKER: &str = "~links";
/// Property name carrying the absolute path of a query hit on the wire.
pub const PATH_MARKER: &str = "~path";
/// Link role tagging service links. Links with this role are not part of the
/// object tree and are skipped by the query traversal.
pub const SERVICE_MARKER: &str = "~service";

/// Quality state of a process value.
///
/// The integer is partitioned into three bands: good `[0,100)`, uncertain
/// `[100,200)` and bad everywhere else, including negative codes. Band
/// membership is tested by range, never by comparing against a specific code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(pub i32);

impl State {
    /// Base value of the good band.
    pub const GOOD: State = State(0);
    /// Base value of the uncertain band.
    pub const UNCERTAIN: State = State(100);
    /// Base value of the bad band.
    pub const BAD: State = State(200);

    /// Returns true if the state is in the good band.
    pub fn is_good(self) -> bool {
        self.0 >= Self::GOOD.0 && self.0 < Self::UNCERTAIN.0
    }

    /// Returns true if the state is in the uncertain band.
    pub fn is_uncertain(self) -> bool {
        self.0 >= Self::UNCERTAIN.0 && self.0 < Self::BAD.0
    }

    /// Returns true if the state is in the bad band.
    pub fn is_bad(self) -> bool {
        self.0 >= Self::BAD.0 || self.0 < Self::GOOD.0
    }
}

/// A process value: a timestamped, quality-stamped value of a data point.
#[derive(Debug, Clone, PartialEq)]
pub struct Pv {
    /// Instant the value was captured. Millisecond granularity on the wire.
    pub time: DateTime<Utc>,
    /// The value itself. Anything JSON-representable.
    pub value: Value,
    /// Quality state of the value.
    pub state: State,
}

impl Pv {
    pub fn new(time: DateTime<Utc>, value: impl Into<Value>, state: State) -> Self {
        Self {
            time,
            value: value.into(),
            state,
        }
    }
}

/// A typed, directed reference from one VEAP object to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Role (or type) of the target, e.g. `collection`, `device`, `~service`.
    pub role: String,
    /// Absolute or relative path of the target object. Path segments must be
    /// percent-escaped, see [`crate::paths::escape_segment`].
    pub target: String,
    /// Optional human readable label, e.g. the title of the target object.
    pub title: Option<String>,
}

impl Link {
    pub fn new(role: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            target: target.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Named attribute values of a VEAP object.
///
/// Names starting with `~` are reserved for protocol markers and must not be
/// used by applications; the protocol layer adds and strips them on the wire.
pub type AttrValues = serde_json::Map<String, Value>;
