use serde::{Deserialize, Serialize};

/// Value stored under a progress key in the local database.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalEntry {
    pub current: u64,
    pub version: u64, // bumped on every write
}
