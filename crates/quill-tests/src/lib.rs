//! Cross-crate test suite for Quill.
//!
//! Integration tests drive the engines through a [`ChainNode`] the way a
//! block producer would, and check the protocol's accounting invariants
//! under randomized and adversarial inputs.
//!
//! [`ChainNode`]: quill_node_lib::ChainNode

pub mod helpers;
