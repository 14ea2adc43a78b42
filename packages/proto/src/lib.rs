//! Generated protobuf types for the payments platform.
//!
//! The wire contract between the authorization service, the worker, and the
//! payment token service. Event payloads in `payment_events` and outbox/queue
//! message bodies are the prost-encoded messages defined here.

pub mod payments {
    pub mod v1 {
        tonic::include_proto!("payments.v1");
    }
}
