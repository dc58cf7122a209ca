use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in the source stream, exchanged with the host runtime as `{"offset": n}`.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct Offset {
    pub offset: u64,
}

impl Offset {
    pub const ZERO: Offset = Offset { offset: 0 };

    pub fn new(offset: u64) -> Self {
        Offset { offset }
    }

    /// Returns the offset `rows` positions further along.
    pub fn advance(self, rows: u64) -> Self {
        Offset {
            offset: self.offset.saturating_add(rows),
        }
    }

    /// Number of rows between `self` and `end`, zero if `end` is behind.
    pub fn distance_to(&self, end: &Offset) -> u64 {
        end.offset.saturating_sub(self.offset)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_single_field_mapping() {
        let json = serde_json::to_string(&Offset::new(52)).unwrap();
        assert_eq!(json, r#"{"offset":52}"#);

        let back: Offset = serde_json::from_str(r#"{"offset": 7}"#).unwrap();
        assert_eq!(back, Offset::new(7));
    }

    #[test]
    fn distance_is_zero_when_end_is_behind() {
        let start = Offset::new(30);
        assert_eq!(start.distance_to(&Offset::new(40)), 10);
        assert_eq!(start.distance_to(&Offset::new(20)), 0);
    }
}
