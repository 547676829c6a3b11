//! # txtrace-levm
//!
//! The interpreter behind `txtrace`: runs one transaction against an in-memory world state and
//! reports its outcome, its state changes and its call tree.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           VM                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐ │
//! │  │  CallFrame  │  │   Memory    │  │       Stack         │ │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘ │
//! │                                                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐ │
//! │  │  Substate   │  │ Precompiles │  │   Environment       │ │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘ │
//! │                                                             │
//! │  ┌─────────────┐  ┌─────────────────────────────────────┐  │
//! │  │    Hooks    │  │          LevmCallTracer             │  │
//! │  └─────────────┘  └─────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        WorldState                            │
//! │        (prestate snapshot, working copy, touched set)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Components
//!
//! - [`vm::VM`]: frame-stack interpreter for a single transaction
//! - [`call_frame::CallFrame`]: execution context of each call, with its changeset
//! - [`environment::ChainRuleset`]: versioned gas schedule and limits, L1 or OP-Stack
//! - [`hooks`]: fee validation and settlement per chain type
//! - [`tracing::LevmCallTracer`]: call tree builder
//! - [`db::WorldState`]: lazily loaded accounts plus the pre-image of everything touched
//!
//! ## Usage
//!
//! ```ignore
//! let mut db = WorldState::new(InMemoryDatabase::new(accounts));
//! let mut vm = VM::new(env, &mut db, &tx, LevmCallTracer::new(true));
//! let report = vm.execute()?;
//! let calls = vm.tracer.into_root();
//! ```

pub mod call_frame;
pub mod constants;
pub mod db;
pub mod environment;
pub mod errors;
pub mod execution_handlers;
pub mod gas_cost;
pub mod hooks;
pub mod memory;
pub mod opcode_handlers;
pub mod opcodes;
pub mod precompiles;
pub mod tracing;
pub mod utils;
pub mod vm;
pub use environment::*;
