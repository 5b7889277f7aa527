// Ephemeral per-tab identifier

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time-based tab id, "{unix millis}-{random base36}".
///
/// Collisions are improbable but not impossible; a collision only produces a
/// short dual-leader window that the claim/ack exchange settles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let mut rng = rand::thread_rng();
        let suffix: String = (0..7)
            .map(|_| {
                let digit = rng.gen_range(0..36u32);
                std::char::from_digit(digit, 36).unwrap_or('0')
            })
            .collect();
        TabId(format!("{}-{}", millis, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TabId {
    fn from(value: &str) -> Self {
        TabId(value.to_string())
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
