//! Session orchestration
//!
//! The [`SessionScheduler`] turns a [`Protocol`](crate::protocol::Protocol)
//! into a timed stream of [`SessionEvent`]s while commanding a
//! [`SoundEngine`](crate::engine::SoundEngine).

pub mod events;
pub mod scheduler;
pub mod timers;

pub use events::{EventKind, EventPayload, SessionEvent};
pub use scheduler::{
    EventStream, Listener, ListenerId, SessionScheduler, SessionStatus, StartOutcome,
};
pub use timers::TimerSet;
