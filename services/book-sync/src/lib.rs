//! Order-Book Sync Engine
//!
//! Reconciles a periodic full-snapshot source and an unordered delta stream
//! into one authoritative order book per instrument, and derives windowed
//! price velocity used to raise dip/spike alerts.
//!
//! Single-threaded: every mutation is a synchronous `&mut self` call on the
//! one owner of the state, in local receipt order per instrument.
//!
//! # Architecture
//!
//! ```text
//!  Delta stream frames          Snapshot source
//!          │                          │
//!     ┌────▼─────┐                    │
//!     │ Ingester │  ← decodes, routes, tracks connection state
//!     └────┬─────┘                    │
//!          │                          │
//!   ┌──────▼──────────────────────────▼──┐
//!   │           OrderBookRegistry        │
//!   │  ┌────────┐ ┌───────┐ ┌─────────┐  │
//!   │  │Snapshot│ │ Delta │ │ Pending │  │
//!   │  └───┬────┘ └───┬───┘ └────┬────┘  │
//!   │      └─────┬────┘──────────┘       │
//!   │         ┌──▼───┐   ┌────────┐      │
//!   │         │Levels│   │History │      │
//!   │         └──────┘   └───┬────┘      │
//!   │                    ┌───▼────┐      │
//!   │                    │Velocity│      │
//!   │                    └───┬────┘      │
//!   └────────────────────────┼───────────┘
//!                       ┌────▼────┐
//!                       │ Alerts  │ → notification sinks
//!                       └─────────┘
//! ```

pub mod alerts;
pub mod config;
pub mod delta;
pub mod events;
pub mod history;
pub mod ingestion;
pub mod levels;
pub mod notify;
pub mod order_book;
pub mod pending;
pub mod registry;
pub mod replay;
pub mod snapshot;
pub mod trades;
pub mod velocity;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
