//! # quill-budget — Budget allocation engine.
//!
//! A budget locks a balance and releases it at a constant rate per block
//! until its deadline:
//! - **Account budgets** are funded from the owner's liquid balance and
//!   refund whatever is left when they close.
//! - **The fund budget** is created once at genesis from newly issued
//!   supply. Its remainder is retired rather than refunded, and the block's
//!   witness takes a cut of every allocation.
//!
//! Allocated cash feeds the reward fund that pays comment rewards.

pub mod engine;
pub mod funds;

pub use engine::{allocate_cash, close_budget, create_budget, create_fund_budget, per_block_amount};
pub use funds::{process_funds, FundsSummary, ProcessFunds};
