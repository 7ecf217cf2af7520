//! Partitioning of a view range into bounded block requests.
//!
//! Gallica renders at most a limited number of views per PDF request before
//! timing out, so a document is requested as an ordered series of blocks.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::gallica::MetadataError;

/// A contiguous run of views: `[start, start + count - 1]`, 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Block {
    start: u32,
    count: u32,
}

impl Block {
    /// # Errors
    ///
    /// [`PlanningError::InvalidStart`] for `start == 0`,
    /// [`PlanningError::InvalidBlockSize`] for `count == 0` or a block that
    /// would run past `u32::MAX`.
    pub fn new(start: u32, count: u32) -> Result<Self, PlanningError> {
        if start == 0 {
            return Err(PlanningError::InvalidStart { start });
        }
        if count == 0 || start.checked_add(count - 1).is_none() {
            return Err(PlanningError::InvalidBlockSize { size: count });
        }
        Ok(Self { start, count })
    }

    #[must_use]
    pub fn start(&self) -> u32 {
        self.start
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Last view in the block (inclusive).
    #[must_use]
    pub fn end(&self) -> u32 {
        self.start + (self.count - 1)
    }

    /// Gallica range qualifier, e.g. `f101n100`.
    #[must_use]
    pub fn qualifier(&self) -> String {
        format!("f{}n{}", self.start, self.count)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "views {}-{}", self.start, self.end())
    }
}

/// Ordered, contiguous, non-overlapping blocks covering one range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockPlan {
    blocks: Vec<Block>,
}

impl BlockPlan {
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// First view covered, if any.
    #[must_use]
    pub fn first_view(&self) -> Option<u32> {
        self.blocks.first().map(Block::start)
    }

    /// Last view covered, if any.
    #[must_use]
    pub fn last_view(&self) -> Option<u32> {
        self.blocks.last().map(Block::end)
    }

    /// Number of views across all blocks.
    #[must_use]
    pub fn total_views(&self) -> u64 {
        self.blocks.iter().map(|b| u64::from(b.count)).sum()
    }
}

impl<'a> IntoIterator for &'a BlockPlan {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

/// Errors raised before any block is fetched.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("start view must be at least 1, got {start}")]
    InvalidStart { start: u32 },

    #[error("end view {end} is before start view {start}")]
    EndBeforeStart { start: u32, end: u32 },

    #[error("block size must be at least 1, got {size}")]
    InvalidBlockSize { size: u32 },

    /// Needed the total number of views and could not get it.
    #[error("could not determine the number of views of {ark}: {source}")]
    PageCount {
        ark: String,
        #[source]
        source: MetadataError,
    },

    #[error("{ark} has no views")]
    EmptyResource { ark: String },
}

/// Splits `[start, end]` into the fewest blocks of at most `max_block_size`.
///
/// All blocks but the last hold exactly `max_block_size` views.
///
/// # Errors
///
/// [`PlanningError`] when `start < 1`, `end < start` or `max_block_size < 1`.
///
/// # Examples
///
/// ```
/// use gallica_core::download::partition;
///
/// let plan = partition(1, 250, 100).unwrap();
/// let bounds: Vec<_> = plan.iter().map(|b| (b.start(), b.count())).collect();
/// assert_eq!(bounds, [(1, 100), (101, 100), (201, 50)]);
/// ```
pub fn partition(start: u32, end: u32, max_block_size: u32) -> Result<BlockPlan, PlanningError> {
    if start == 0 {
        return Err(PlanningError::InvalidStart { start });
    }
    if end < start {
        return Err(PlanningError::EndBeforeStart { start, end });
    }
    if max_block_size == 0 {
        return Err(PlanningError::InvalidBlockSize {
            size: max_block_size,
        });
    }

    let mut blocks = Vec::new();
    let mut cursor = start;
    loop {
        let count = max_block_size.min(end - cursor + 1);
        blocks.push(Block {
            start: cursor,
            count,
        });
        match cursor.checked_add(count) {
            Some(next) if next <= end => cursor = next,
            _ => break,
        }
    }

    Ok(BlockPlan { blocks })
}
