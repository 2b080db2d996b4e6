//! Voice backends for Parley.
//!
//! The call coordinator talks to every voice backend through the
//! [`VoiceBackend`] trait: start a call and receive an [`EventSubscription`],
//! stop it, mute, unmute. Two implementations ship here:
//!
//! - [`RealBackend`] connects to the voice provider's event channel over a
//!   WebSocket and translates its JSON frames into [`VoiceEvent`]s.
//! - [`SimulatedBackend`] plays a declarative [`Script`] of timed events so
//!   the UI and transcript logging can be exercised without a provider.
//!
//! The server side of the provider integration, minting web-call
//! credentials, lives in [`VoiceService`].

pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod realtime;
pub mod script;
pub mod service;
pub mod simulated;

pub use backend::{BackendKind, CallHandle, CallParams, EventSubscription, VoiceBackend};
pub use config::{RealtimeConfig, VoiceApiConfig, PLACEHOLDER_API_KEY};
pub use error::VoiceError;
pub use event::VoiceEvent;
pub use realtime::RealBackend;
pub use script::{Script, ScriptHandle, ScriptStep};
pub use service::{VoiceService, WebCall};
pub use simulated::SimulatedBackend;
