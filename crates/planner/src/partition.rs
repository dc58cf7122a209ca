use crate::error::PlanError;
use model::pagination::{offset::Offset, partition::Partition};
use serde::{Deserialize, Serialize};

pub trait PartitionStrategy: Send + Sync {
    /// Splits the batch `[start, end)` into partitions.
    fn plan(&self, start: Offset, end: Offset) -> Result<Vec<Partition>, PlanError>;
}

/// One partition covering the whole batch.
#[derive(Debug, Clone, Copy)]
pub struct SingleRange;

/// Up to `parts` contiguous sub-ranges fetched in parallel.
#[derive(Debug, Clone, Copy)]
pub struct SplitRange {
    pub parts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfig {
    pub num_partitions: usize,
}

impl Default for PlanConfig {
    fn default() -> Self {
        PlanConfig { num_partitions: 1 }
    }
}

fn check_range(start: Offset, end: Offset) -> Result<(), PlanError> {
    if start > end {
        return Err(PlanError::InvalidRange {
            start: start.offset,
            end: end.offset,
        });
    }
    Ok(())
}

impl PartitionStrategy for SingleRange {
    fn plan(&self, start: Offset, end: Offset) -> Result<Vec<Partition>, PlanError> {
        check_range(start, end)?;
        Ok(vec![Partition::spanning(start, end)?])
    }
}

impl PartitionStrategy for SplitRange {
    fn plan(&self, start: Offset, end: Offset) -> Result<Vec<Partition>, PlanError> {
        check_range(start, end)?;
        if self.parts == 0 {
            return Err(PlanError::InvalidPartitionCount(self.parts));
        }

        let span = start.distance_to(&end);
        // Never produce empty sub-ranges
        let parts = (self.parts as u64).min(span);
        if parts == 0 {
            return Ok(Vec::new());
        }

        let base = span / parts;
        let remainder = span % parts;

        let mut partitions = Vec::with_capacity(parts as usize);
        let mut lower = start.offset;
        for idx in 0..parts {
            // The first `remainder` ranges take one extra row
            let len = base + u64::from(idx < remainder);
            partitions.push(Partition::new(idx as usize, lower, lower + len)?);
            lower += len;
        }

        Ok(partitions)
    }
}

pub fn strategy_from_config(config: &PlanConfig) -> Result<Box<dyn PartitionStrategy>, PlanError> {
    match config.num_partitions {
        0 => Err(PlanError::InvalidPartitionCount(0)),
        1 => Ok(Box::new(SingleRange)),
        parts => Ok(Box::new(SplitRange { parts })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn off(n: u64) -> Offset {
        Offset::new(n)
    }

    #[test]
    fn single_range_returns_exactly_one_partition() {
        for (start, end) in [(0, 0), (0, 10), (42, 52), (20, 1_000)] {
            let parts = SingleRange.plan(off(start), off(end)).unwrap();
            assert_eq!(parts.len(), 1);
            assert_eq!(parts[0].bounds(), (start, end));
        }
    }

    #[test]
    fn rejects_start_after_end() {
        assert_eq!(
            SingleRange.plan(off(10), off(5)),
            Err(PlanError::InvalidRange { start: 10, end: 5 })
        );
    }

    #[test]
    fn split_range_covers_span_without_overlap() {
        let parts = SplitRange { parts: 3 }.plan(off(20), off(30)).unwrap();
        let bounds: Vec<_> = parts.iter().map(|p| p.bounds()).collect();
        assert_eq!(bounds, vec![(20, 24), (24, 27), (27, 30)]);

        let indexes: Vec<_> = parts.iter().map(|p| p.index()).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn split_range_never_emits_empty_partitions() {
        let parts = SplitRange { parts: 8 }.plan(off(0), off(3)).unwrap();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.len() == 1));

        assert!(SplitRange { parts: 4 }.plan(off(5), off(5)).unwrap().is_empty());
    }

    #[test]
    fn config_selects_strategy() {
        let single = strategy_from_config(&PlanConfig::default()).unwrap();
        assert_eq!(single.plan(off(0), off(10)).unwrap().len(), 1);

        let split = strategy_from_config(&PlanConfig { num_partitions: 2 }).unwrap();
        assert_eq!(split.plan(off(0), off(10)).unwrap().len(), 2);

        assert!(strategy_from_config(&PlanConfig { num_partitions: 0 }).is_err());
    }
}
