// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! # Event delivery
//!
//! Receives device notifications on a local HTTP endpoint and fans them out
//! to typed queues. Four pieces:
//!
//! | Piece             | Role                                              |
//! |-------------------|---------------------------------------------------|
//! | [`queue`]         | per-event-kind queues with an explicit drain policy |
//! | [`registry`]      | client-context to scan-destination mapping        |
//! | [`server`]        | axum listener dispatching notifications           |
//! | [`monitor`]       | consumer view merging baseline + queued deltas    |

pub mod monitor;
pub mod queue;
pub mod registry;
pub mod server;

pub use monitor::ScannerMonitor;
pub use queue::{EventQueue, EventQueues, QueuePolicy};
pub use registry::{ContextRegistry, ScanSlot};
pub use server::{EventServer, EventServerState};
