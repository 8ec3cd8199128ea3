//! Step protocol: one request per driver transition, JSON encoded.
//!
//! The server side ([`WireHandler`]) applies a request to the persisted cursor.
//! The client side ([`WireExecutor`] and [`RemoteLifecycle`]) lets a local
//! driver run against a remote server through any [`StepTransport`].

pub mod client;
pub mod handler;
pub mod http;
pub mod message;

pub use client::{RemoteLifecycle, StepTransport, WireExecutor};
pub use handler::WireHandler;
pub use http::HttpStepTransport;
pub use message::{StepAction, StepData, StepRequest, StepResponse};
