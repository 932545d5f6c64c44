//! The per-block task pipeline.
//!
//! Every accepted block runs the built-in tasks in [`BLOCK_TASK_ORDER`],
//! then any tasks registered on the pipeline, each exactly once. The first
//! failure stops the run; the caller owns rollback.

use std::fmt;

use serde::Serialize;
use tracing::trace;

use quill_budget::ProcessFunds;
use quill_consensus::UpdateWitnessSchedule;
use quill_core::block_task::{BlockTask, BlockTaskContext};
use quill_core::error::QuillError;
use quill_rewards::ProcessCommentsCashout;

/// Built-in block tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockTaskKind {
    ProcessFunds,
    ProcessCommentsCashout,
    UpdateWitnessSchedule,
}

/// Funds feed the reward fund before comments cash out against it; the
/// schedule is rebuilt last, from the stake the payouts produced.
pub const BLOCK_TASK_ORDER: [BlockTaskKind; 3] = [
    BlockTaskKind::ProcessFunds,
    BlockTaskKind::ProcessCommentsCashout,
    BlockTaskKind::UpdateWitnessSchedule,
];

impl BlockTaskKind {
    pub fn task(self) -> &'static dyn BlockTask {
        match self {
            Self::ProcessFunds => &ProcessFunds,
            Self::ProcessCommentsCashout => &ProcessCommentsCashout,
            Self::UpdateWitnessSchedule => &UpdateWitnessSchedule,
        }
    }

    pub fn name(self) -> &'static str {
        self.task().name()
    }
}

/// A task error, tagged with the task that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: &'static str,
    pub source: QuillError,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.task, self.source)
    }
}

/// Built-in tasks plus any registered extras.
#[derive(Default)]
pub struct BlockTaskPipeline {
    extra: Vec<Box<dyn BlockTask>>,
}

impl fmt::Debug for BlockTaskPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockTaskPipeline")
            .field("tasks", &self.task_names())
            .finish()
    }
}

impl BlockTaskPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task that runs after the built-in ones.
    pub fn register(&mut self, task: Box<dyn BlockTask>) {
        self.extra.push(task);
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        BLOCK_TASK_ORDER
            .iter()
            .map(|kind| kind.name())
            .chain(self.extra.iter().map(|task| task.name()))
            .collect()
    }

    pub fn run(&self, ctx: &mut BlockTaskContext<'_>) -> Result<(), TaskFailure> {
        let builtin = BLOCK_TASK_ORDER.iter().map(|kind| kind.task());
        let extra = self.extra.iter().map(|task| task.as_ref());
        for task in builtin.chain(extra) {
            trace!(block_num = ctx.block_num(), task = task.name(), "running block task");
            task.on_apply(ctx).map_err(|source| TaskFailure { task: task.name(), source })?;
        }
        Ok(())
    }
}

/// Run the built-in tasks only.
pub fn run_block_tasks(ctx: &mut BlockTaskContext<'_>) -> Result<(), TaskFailure> {
    BlockTaskPipeline::default().run(ctx)
}
