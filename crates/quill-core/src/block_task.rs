//! Per-block task context.
//!
//! A [`BlockTaskContext`] bundles everything a block task may touch: the
//! ledger, the virtual-operation sink, chain parameters, and the block being
//! applied. It exists only for the duration of one pipeline run.

use crate::error::{InvariantError, QuillError};
use crate::operations::{VirtualOperation, VirtualOperationSink};
use crate::params::ChainParams;
use crate::traits::Ledger;
use crate::types::Timestamp;

pub struct BlockTaskContext<'a> {
    ledger: &'a mut dyn Ledger,
    vops: &'a mut dyn VirtualOperationSink,
    params: &'a ChainParams,
    block_num: u64,
    block_time: Timestamp,
}

impl<'a> BlockTaskContext<'a> {
    /// Fails with [`InvariantError::ZeroBlockNumber`] for block 0: genesis
    /// is never applied through the pipeline.
    pub fn new(
        ledger: &'a mut dyn Ledger,
        vops: &'a mut dyn VirtualOperationSink,
        params: &'a ChainParams,
        block_num: u64,
        block_time: Timestamp,
    ) -> Result<Self, QuillError> {
        if block_num == 0 {
            return Err(InvariantError::ZeroBlockNumber.into());
        }
        Ok(Self { ledger, vops, params, block_num, block_time })
    }

    pub fn ledger(&self) -> &dyn Ledger {
        &*self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut dyn Ledger {
        &mut *self.ledger
    }

    pub fn params(&self) -> &ChainParams {
        self.params
    }

    pub fn block_num(&self) -> u64 {
        self.block_num
    }

    pub fn block_time(&self) -> Timestamp {
        self.block_time
    }

    pub fn push_virtual_operation(&mut self, op: VirtualOperation) {
        self.vops.push_virtual_operation(op);
    }

    /// Split borrow for engines that mutate the ledger and emit operations
    /// in the same call.
    pub fn parts(&mut self) -> (&mut dyn Ledger, &mut dyn VirtualOperationSink, &ChainParams) {
        (&mut *self.ledger, &mut *self.vops, self.params)
    }
}

/// One state transition run once per block.
pub trait BlockTask: Send + Sync {
    /// Stable name used in logs and rejection errors.
    fn name(&self) -> &'static str;

    fn on_apply(&self, ctx: &mut BlockTaskContext<'_>) -> Result<(), QuillError>;
}
