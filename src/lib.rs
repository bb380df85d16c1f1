//! Scenarist core library.
//!
//! Binds natural-language scenario steps to typed handlers. Step templates
//! live in a [`registry::StepRegistry`]; handlers receive bound arguments,
//! a per-scenario [`context::Context`] and the fixtures they declared, which
//! the [`fixture::FixtureResolver`] creates once per session or scenario.
//! [`engine::Engine`] ties these together and reports a
//! [`dispatch::RunReport`].
//!
//! The [`platform`] module supplies a cluster-inspection vocabulary written
//! against the [`platform::PlatformGateway`] trait.

pub mod cli;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod fixture;
pub mod hooks;
pub mod pattern;
pub mod platform;
pub mod registry;
pub mod runner;
pub mod step;
pub mod suite;
