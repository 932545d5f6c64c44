//! # quill-core
//! Foundation types, ledger accessors, and errors for the Quill protocol.
//!
//! Everything consensus-relevant is integer math over records reached
//! through the [`traits::Ledger`] trait. [`ledger::MemoryLedger`] is the
//! reference store used by the node, the simulator, and the test suites.

pub mod block_task;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod math;
pub mod operations;
pub mod params;
pub mod traits;
pub mod types;
