//! Agent Runtime - planner-driven booking orchestration
//!
//! This crate is the "brain" of the maitred system. It turns a user's chat
//! message into a bounded plan-act-observe loop:
//!
//! 1. **Pre-analysis** (`conversation`) - cheap keyword scan of the message
//! 2. **Planning** (`llm`) - a language model picks the next tool or final reply
//! 3. **Tool Execution** (`tools`) - closed set of booking operations
//! 4. **Reconciliation** (`reconciler`) - provider-authoritative booking views
//!
//! # Safety Principle
//!
//! The language model is strictly a translator. It NEVER bypasses validation,
//! ownership checks, or the reconciler: every tool call re-validates its
//! inputs and re-checks who owns what before touching the provider.

pub mod autofill;
pub mod conversation;
pub mod llm;
pub mod prompt;
pub mod reconciler;
pub mod runtime;
pub mod tools;
