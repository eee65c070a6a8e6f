//! Agent Runtime
//!
//! This module runs a single agent invocation to completion.
//!
//! # Architecture
//!
//! - **AgentExecutor**: validates parameters, drives the lifecycle hooks and
//!   runs the agent body under a timer, retrying failed attempts with a delay
//! - **ExecutionResult**: the well-formed record every invocation produces,
//!   whatever its outcome
//! - **ExecutorStatistics**: running totals across all invocations
//!
//! # Invocation State Machine
//!
//! ```text
//! pending --validate ok--> running --ok--> succeeded
//!    |                      |   ^
//!    |                      |   | attempt <= retry_count
//!    |             err/timeout  |
//!    |                      v   |
//!    |                    backoff
//!    |                      |
//!    |                      +--retries exhausted--> failed | timeout
//!    +--validate false--> invalid_params
//! ```
//!
//! Agent bodies run on their own Tokio task. A timeout aborts that task; a
//! cancellation leaves it running and detaches it, with `cleanup` deferred
//! until the body finishes.

pub mod agent_executor;

pub use agent_executor::*;
