//! Event payload constructors.
//!
//! Events are stored as prost-encoded protobuf in `payment_events.payload`;
//! the same encoding rides the outbox into the queue.

use chrono::Utc;
use prost::Message as _;
use uuid::Uuid;

use tably_proto::payments::v1::{
    AuthRequestCreated, AuthRequestQueuedMessage, AuthVoidRequested, VoidRequestQueuedMessage,
};

use crate::domain::types::NewAuthRequest;

pub const EVENT_AUTH_REQUEST_CREATED: &str = "AuthRequestCreated";
pub const EVENT_AUTH_VOID_REQUESTED: &str = "AuthVoidRequested";

pub const AGGREGATE_TYPE_AUTH_REQUEST: &str = "auth_request";

pub fn auth_request_created(request: &NewAuthRequest) -> Vec<u8> {
    AuthRequestCreated {
        auth_request_id: request.auth_request_id.to_string(),
        payment_token: request.payment_token.clone(),
        restaurant_id: request.restaurant_id.to_string(),
        amount_minor: request.amount_minor,
        currency: request.currency.clone(),
        created_at: Utc::now().timestamp(),
        metadata: request
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
    .encode_to_vec()
}

pub fn auth_void_requested(auth_request_id: Uuid, reason: &str) -> Vec<u8> {
    AuthVoidRequested {
        auth_request_id: auth_request_id.to_string(),
        reason: reason.to_owned(),
        requested_at: Utc::now().timestamp(),
    }
    .encode_to_vec()
}

pub fn auth_request_queued_message(auth_request_id: Uuid, restaurant_id: Uuid) -> Vec<u8> {
    AuthRequestQueuedMessage {
        auth_request_id: auth_request_id.to_string(),
        restaurant_id: restaurant_id.to_string(),
        created_at: Utc::now().timestamp(),
    }
    .encode_to_vec()
}

pub fn void_request_queued_message(
    auth_request_id: Uuid,
    restaurant_id: Uuid,
    reason: &str,
) -> Vec<u8> {
    VoidRequestQueuedMessage {
        auth_request_id: auth_request_id.to_string(),
        restaurant_id: restaurant_id.to_string(),
        reason: reason.to_owned(),
        created_at: Utc::now().timestamp(),
    }
    .encode_to_vec()
}
