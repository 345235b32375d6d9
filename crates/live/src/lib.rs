//! CyNova Live Server
//!
//! Pushes run events to any connected websocket observer while the run is
//! in progress (for example the HTML report opened with `?live=1`).
//!
//! ```text
//! Reporter ──send()──▶ broadcast channel ──▶ observer 1 (ws)
//!                                        ├─▶ observer 2 (ws)
//!                                        └─▶ ...
//! ```
//!
//! Sending never blocks and never fails from the caller's point of view.
//! A slow or broken observer is dropped without affecting the others.

pub mod server;

pub use server::LiveServer;
