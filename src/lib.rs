//! Anti-theft protection graphs for frame-evaluated avatar state machines.
//!
//! Architecture:
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │    Config    │────►│   Compile    │────►│    Verify    │
//! │ (env / json) │     │ (pure fns)   │     │ (self-check) │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                                                  │
//!                                                  ▼
//!                      ┌──────────────┐     ┌──────────────┐
//!                      │   Replicas   │◄────│  Controller  │
//!                      │ (per frame)  │     │ (asset/json) │
//!                      └──────────────┘     └──────────────┘
//! ```
//!
//! The four compiled components (automaton, timer, lock, deterrent) talk to
//! each other only through three parameters: `Success`, `Expired` and
//! `IsLocal`.

pub mod asset;
pub mod batch;
pub mod compile;
pub mod config;
pub mod error;
pub mod graph;
pub mod logging;
pub mod runtime;
pub mod verify;
