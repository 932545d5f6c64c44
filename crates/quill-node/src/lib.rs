//! # quill-node — Block application, queries, and configuration.
//!
//! Composes the Quill engines into a chain that applies blocks:
//! - [`pipeline`]: the ordered per-block task list
//! - [`node::ChainNode`]: ledger ownership, rollback, and observers
//! - [`query`]: read-only JSON views over the ledger
//! - [`history::OperationHistory`]: virtual operation index
//! - [`config::NodeConfig`] and [`genesis::GenesisState`]: startup inputs

pub mod config;
pub mod error;
pub mod genesis;
pub mod history;
pub mod node;
pub mod pipeline;
pub mod query;

pub use config::{LogFormat, NodeConfig};
pub use error::NodeError;
pub use genesis::GenesisState;
pub use history::OperationHistory;
pub use node::{AppliedBlock, ChainNode, VirtualOperationObserver};
pub use pipeline::{run_block_tasks, BlockTaskKind, BlockTaskPipeline, BLOCK_TASK_ORDER};
