//! Camera identity and dedupe keys.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a camera as it appears on jobs and alerts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CameraIdentity {
    pub id: String,
    pub name: String,
    pub zone: String,
    pub event_type: String,
}

impl CameraIdentity {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        zone: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            zone: zone.into(),
            event_type: event_type.into(),
        }
    }

    /// The dedupe key for events raised by this camera.
    pub fn event_key(&self) -> EventKey {
        EventKey::new(&self.id, &self.zone, &self.event_type)
    }
}

/// Separator between the parts of an [`EventKey`]. Identifiers must not contain it.
pub const EVENT_KEY_SEPARATOR: char = '|';

/// Stable key used to suppress duplicate alerts.
///
/// Composed of `camera|zone|event_type`. Track ids are never part of the
/// key because trackers reassign them mid-event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct EventKey(pub String);

impl EventKey {
    pub fn new(camera_id: &str, zone: &str, event_type: &str) -> Self {
        let sep = EVENT_KEY_SEPARATOR;
        Self(format!("{camera_id}{sep}{zone}{sep}{event_type}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
