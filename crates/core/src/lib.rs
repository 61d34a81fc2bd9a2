//! Accessgate Core - Subscription Access Gating Engine
//!
//! This crate provides the client-side access gate for a subscription-backed app:
//! - Expiry instant derivation from heterogeneous subscription/plan encodings
//! - Server clock synchronization so the local clock is never trusted alone
//! - A single expiry timer that works around the platform timer cap
//! - Status reconciliation from periodic and event-driven polls
//! - Request interception: denial detection and suspended-mode short-circuiting
//!
//! The engine never performs I/O on its own. The transport, navigation layer,
//! flag store and clock are injected, which keeps it runtime-free and testable.

pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod expiry;
pub mod interceptor;
pub mod model;
pub mod policy;
pub mod poller;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod timer;
pub mod timestamp;
pub mod transport;

pub use clock::{Clock, ClockSynchronizer, ManualClock, SystemClock};
pub use config::GateConfig;
pub use engine::{AccessEngine, EngineEvent, Identity, PollOutcome};
pub use error::{GateError, TransportError};
pub use expiry::{Expiry, ExpiryComputer, ExpirySource};
pub use interceptor::{request_path, Outbound, RequestInterceptor};
pub use model::{Plan, StatusResponse, Subscription};
pub use policy::{RoleRedirectPolicy, SuspendBehavior, Surfaces};
pub use poller::{PollTicket, PollTrigger, PollVerdict, StatusPoller};
pub use state::{
    AccessState, AccessStateMachine, FlagStore, MemoryFlagStore, Navigator, SuspendReason,
    Transition,
};
pub use timer::{ArmOutcome, TimerEvent, TimerKind, TimerScheduler};
pub use timestamp::{parse_lenient, RawTimestamp};
pub use transport::{HttpRequest, HttpResponse, Method, Transport};

/// Accessgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
