//! HTTP routers for the four services

pub mod game;
pub mod gateway;
pub mod matchmaker;
pub mod telemetry;
