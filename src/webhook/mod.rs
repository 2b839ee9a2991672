//! # Webhook
//!
//! Inbound push notifications: the payload model and the router that turns a
//! delivery into a change set for the sync pipeline.

pub mod payload;
pub mod router;

pub use payload::{PushCommit, PushPayload};
pub use router::{
    application_from_path, is_application_name, is_loopback_message, ChangeSet, EventKind, EventRouter, RejectReason,
    RouteDecision,
};
