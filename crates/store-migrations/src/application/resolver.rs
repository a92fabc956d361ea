//! # Block Hash Resolver
//!
//! Memoizing block-number → block-hash lookup scoped to one upgrade run.
//!
//! Only oracle-confirmed answers are cached. A failed lookup leaves no trace,
//! so rerunning the step after a transient oracle fault starts clean. There is
//! no eviction: the cache is bounded by the distinct block numbers one run
//! touches and is dropped with the resolver.

use crate::domain::{
    BlockHash, BlockInfo, BlockNumber, BlockRequest, MigrationError, ResolverStats,
};
use crate::ports::BlockOracle;
use std::collections::HashMap;
use tracing::debug;

/// Run-scoped block hash cache in front of a [`BlockOracle`].
pub struct BlockHashResolver<'a, O: BlockOracle + ?Sized> {
    oracle: &'a O,
    cache: HashMap<BlockNumber, BlockHash>,
    latest: Option<BlockInfo>,
    stats: ResolverStats,
}

impl<'a, O: BlockOracle + ?Sized> BlockHashResolver<'a, O> {
    /// Create an empty resolver borrowing `oracle` for the run.
    pub fn new(oracle: &'a O) -> Self {
        Self {
            oracle,
            cache: HashMap::new(),
            latest: None,
            stats: ResolverStats::default(),
        }
    }

    /// Hash of block `number`, asking the oracle at most once per number.
    pub fn resolve(&mut self, number: BlockNumber) -> Result<BlockHash, MigrationError> {
        if let Some(hash) = self.cache.get(&number) {
            self.stats.cache_hits += 1;
            debug!("[migrate] Block {} served from cache", number);
            return Ok(hash.clone());
        }

        self.stats.oracle_calls += 1;
        let block = self
            .oracle
            .block_by_number(number)
            .map_err(|source| MigrationError::OracleUnavailable {
                block: BlockRequest::Number(number),
                source,
            })?;

        debug!("[migrate] Block {} resolved to {}", number, block.hash);
        self.cache.insert(number, block.hash.clone());
        Ok(block.hash)
    }

    /// Hash of the chain head, fetched once per run so every caller sees the
    /// same block.
    pub fn resolve_latest(&mut self) -> Result<BlockHash, MigrationError> {
        if let Some(head) = &self.latest {
            self.stats.cache_hits += 1;
            return Ok(head.hash.clone());
        }

        self.stats.oracle_calls += 1;
        let head = self
            .oracle
            .latest_block()
            .map_err(|source| MigrationError::OracleUnavailable {
                block: BlockRequest::Latest,
                source,
            })?;

        debug!("[migrate] Chain head is block {} ({})", head.number, head.hash);
        self.cache.insert(head.number, head.hash.clone());
        let hash = head.hash.clone();
        self.latest = Some(head);
        Ok(hash)
    }

    /// Number of cached block numbers.
    pub fn cached_blocks(&self) -> usize {
        self.cache.len()
    }

    /// Counters for the run report.
    pub fn stats(&self) -> ResolverStats {
        self.stats
    }
}
