//! In-memory virtual operation history.

use std::collections::{BTreeMap, VecDeque};

use parking_lot::RwLock;
use serde::Serialize;

use quill_core::operations::VirtualOperation;
use quill_core::types::{AccountName, Timestamp};

use crate::node::VirtualOperationObserver;

/// One virtual operation with its position in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedOperation {
    pub block_num: u64,
    pub block_time: Timestamp,
    /// Index within the block.
    pub op_index: u32,
    pub op: VirtualOperation,
}

#[derive(Default)]
struct Inner {
    blocks: VecDeque<(u64, Vec<AppliedOperation>)>,
    by_account: BTreeMap<AccountName, Vec<(u64, u32)>>,
}

/// Observer that keeps the operations of the most recent blocks, indexed by
/// block and by impacted account.
pub struct OperationHistory {
    max_blocks: usize,
    inner: RwLock<Inner>,
}

impl OperationHistory {
    /// Keep at most `max_blocks` blocks (at least one).
    pub fn new(max_blocks: usize) -> Self {
        Self { max_blocks: max_blocks.max(1), inner: RwLock::new(Inner::default()) }
    }

    pub fn block_operations(&self, block_num: u64) -> Vec<AppliedOperation> {
        let inner = self.inner.read();
        inner
            .blocks
            .iter()
            .find(|(num, _)| *num == block_num)
            .map(|(_, ops)| ops.clone())
            .unwrap_or_default()
    }

    /// Operations impacting `account`, oldest first.
    pub fn account_history(&self, account: &AccountName) -> Vec<AppliedOperation> {
        let inner = self.inner.read();
        let Some(refs) = inner.by_account.get(account) else {
            return Vec::new();
        };
        refs.iter()
            .filter_map(|(block_num, index)| {
                let (_, ops) = inner.blocks.iter().find(|(num, _)| num == block_num)?;
                ops.get(*index as usize).cloned()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().blocks.iter().map(|(_, ops)| ops.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(&self, inner: &mut Inner) {
        while inner.blocks.len() > self.max_blocks {
            let Some((oldest, _)) = inner.blocks.pop_front() else {
                break;
            };
            inner.by_account.retain(|_, refs| {
                refs.retain(|(num, _)| *num != oldest);
                !refs.is_empty()
            });
        }
    }
}

impl VirtualOperationObserver for OperationHistory {
    fn on_block_operations(&self, block_num: u64, block_time: Timestamp, ops: &[VirtualOperation]) {
        if ops.is_empty() {
            return;
        }
        let mut inner = self.inner.write();
        let mut applied = Vec::with_capacity(ops.len());
        for (i, op) in ops.iter().enumerate() {
            let op_index = i as u32;
            for account in op.impacted_accounts() {
                let refs = inner.by_account.entry(account.clone()).or_default();
                if refs.last() != Some(&(block_num, op_index)) {
                    refs.push((block_num, op_index));
                }
            }
            applied.push(AppliedOperation { block_num, block_time, op_index, op: op.clone() });
        }
        inner.blocks.push_back((block_num, applied));
        self.prune(&mut inner);
    }
}
