//! Block application.
//!
//! [`ChainNode`] owns the ledger behind a `RwLock`. Applying a block takes
//! the write lock for the whole pipeline run; queries take read locks and
//! may run concurrently with each other. A block either commits entirely or
//! leaves no trace: on task failure the ledger is restored from the
//! checkpoint taken before the block, and the buffered virtual operations
//! are dropped without reaching observers.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use quill_consensus::schedule::{scheduled_witness, slot_at_time};
use quill_core::block_task::{BlockTask, BlockTaskContext};
use quill_core::error::{PolicyError, QuillError};
use quill_core::ledger::{MemoryLedger, StateDigest};
use quill_core::operations::VirtualOperation;
use quill_core::params::ChainParams;
use quill_core::traits::Ledger;
use quill_core::types::{AccountName, Timestamp};

use crate::error::NodeError;
use crate::pipeline::{BlockTaskPipeline, TaskFailure};

/// Receives the virtual operations of every committed block.
pub trait VirtualOperationObserver: Send + Sync {
    fn on_block_operations(&self, block_num: u64, block_time: Timestamp, ops: &[VirtualOperation]);
}

/// Outcome of a committed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedBlock {
    pub block_num: u64,
    pub block_time: Timestamp,
    /// Slots elapsed since the previous block; above 1 when slots were missed.
    pub slots: u64,
    pub witness: Option<AccountName>,
    pub operations: usize,
}

pub struct ChainNode {
    ledger: Arc<RwLock<MemoryLedger>>,
    params: ChainParams,
    pipeline: BlockTaskPipeline,
    observers: RwLock<Vec<Arc<dyn VirtualOperationObserver>>>,
}

impl ChainNode {
    pub fn new(ledger: MemoryLedger, params: ChainParams) -> Result<Self, NodeError> {
        params.validate()?;
        Ok(Self {
            ledger: Arc::new(RwLock::new(ledger)),
            params,
            pipeline: BlockTaskPipeline::new(),
            observers: RwLock::new(Vec::new()),
        })
    }

    /// Register a task to run after the built-in ones on every block.
    pub fn register_task(&mut self, task: Box<dyn BlockTask>) {
        self.pipeline.register(task);
    }

    pub fn subscribe(&self, observer: Arc<dyn VirtualOperationObserver>) {
        self.observers.write().push(observer);
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn pipeline(&self) -> &BlockTaskPipeline {
        &self.pipeline
    }

    /// Shared handle to the ledger, for read-only consumers.
    pub fn ledger(&self) -> Arc<RwLock<MemoryLedger>> {
        Arc::clone(&self.ledger)
    }

    /// Run `f` with exclusive access to the ledger between blocks.
    ///
    /// This is how user operations (posting, voting, budget creation) reach
    /// the ledger.
    pub fn with_ledger_mut<R>(&self, f: impl FnOnce(&mut MemoryLedger) -> R) -> R {
        f(&mut self.ledger.write())
    }

    pub fn head_block_number(&self) -> u64 {
        self.ledger.read().global_properties().head_block_number
    }

    pub fn head_block_time(&self) -> Timestamp {
        self.ledger.read().global_properties().time
    }

    /// Time of the next slot after the head block.
    pub fn next_slot_time(&self) -> Timestamp {
        let props = self.ledger.read().global_properties();
        quill_consensus::schedule::slot_time(&props, self.params.block_interval_secs, 1)
    }

    pub fn state_digest(&self) -> Result<StateDigest, NodeError> {
        Ok(self.ledger.read().state_digest()?)
    }

    /// Apply the next block, produced at `block_time`.
    pub fn apply_block(&self, block_time: Timestamp) -> Result<AppliedBlock, NodeError> {
        let mut ledger = self.ledger.write();
        let mut props = ledger.global_properties();
        let slots = slot_at_time(&props, self.params.block_interval_secs, block_time);
        if slots == 0 {
            return Err(QuillError::from(PolicyError::BlockTimeNotAfterHead { time: block_time, head: props.time }).into());
        }

        let checkpoint = ledger.checkpoint();
        let witness = scheduled_witness(&*ledger, slots);
        let block_num = props.head_block_number + 1;
        props.head_block_number = block_num;
        props.time = block_time;
        props.current_aslot = props.current_aslot.saturating_add(slots);
        props.current_witness = witness.clone();
        ledger.set_global_properties(props);

        let mut vops: Vec<VirtualOperation> = Vec::new();
        let result = BlockTaskContext::new(&mut *ledger, &mut vops, &self.params, block_num, block_time)
            .map_err(|source| TaskFailure { task: "block_context", source })
            .and_then(|mut ctx| self.pipeline.run(&mut ctx));

        if let Err(failure) = result {
            ledger.restore(checkpoint);
            warn!(block_num, task = failure.task, error = %failure.source, "block rejected, state rolled back");
            return Err(NodeError::BlockRejected {
                block_num,
                task: failure.task,
                source: failure.source,
            });
        }
        drop(ledger);

        info!(
            block_num,
            block_time,
            witness = witness.as_ref().map(|w| w.as_str()).unwrap_or("-"),
            ops = vops.len(),
            "applied block"
        );
        for observer in self.observers.read().iter() {
            observer.on_block_operations(block_num, block_time, &vops);
        }
        Ok(AppliedBlock {
            block_num,
            block_time,
            slots,
            witness,
            operations: vops.len(),
        })
    }
}
