//! `Attune` - session timing engine for attention-training audio exercises
//!
//! A session plays a catalog of spatially positioned ambient sounds and
//! walks the listener through three phases: selective attention on one
//! sound, rapid switching between sounds, and divided attention across all
//! of them. This library provides the protocol model, the scheduler that
//! drives a session against a [`engine::SoundEngine`], and the session
//! record store used for before/after self-ratings.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod report;
pub mod session;
pub mod store;
