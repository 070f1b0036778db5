//! Background tasks and event stream.

/// Event stream types emitted by the engine.
pub mod events;
/// Periodic flag index refresh loop.
pub mod refresher;
