//! Synchronization engine services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! `engine` owns the event loop. `dispatch` and `broadcast` add the message
//! handling to it, `catchup` and `scheduler` provide its timed work, and
//! `registry` tracks connections. `storage`, `loader` and `persistence` move
//! the canvas to and from disk outside the loop.

pub mod broadcast;
pub mod catchup;
pub mod dispatch;
pub mod engine;
pub mod loader;
pub mod persistence;
pub mod registry;
pub mod scheduler;
pub mod storage;
