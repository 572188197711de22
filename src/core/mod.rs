//! Core session components
//!
//! This module contains the per-message orchestration: capture a
//! screenshot, ask the model, record both sides of the exchange.

mod session;

pub use session::ChatSession;
