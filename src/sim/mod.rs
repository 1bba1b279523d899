//! Authoritative match simulation
//!
//! The world owns all mutable match state and is advanced by a fixed-step
//! integrator at 120 Hz. Everything here is pure compute; I/O lives in the
//! session layer.

pub mod ball;
pub mod bot;
pub mod car;
pub mod constants;
pub mod world;

pub use world::{PlayerSpawn, World};
