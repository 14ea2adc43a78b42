//! Event payload constructors for worker-recorded events.

use chrono::Utc;
use prost::Message as _;
use uuid::Uuid;

use tably_domain::result::{AuthorizedResult, DeniedResult, VoidResult};
use tably_proto::payments::v1 as proto;

pub const EVENT_AUTH_ATTEMPT_STARTED: &str = "AuthAttemptStarted";
pub const EVENT_AUTH_RESPONSE_RECEIVED: &str = "AuthResponseReceived";
pub const EVENT_AUTH_ATTEMPT_FAILED: &str = "AuthAttemptFailed";
pub const EVENT_AUTH_REQUEST_EXPIRED: &str = "AuthRequestExpired";
pub const EVENT_AUTH_VOID_COMPLETED: &str = "AuthVoidCompleted";

pub fn attempt_started(auth_request_id: Uuid, worker_id: &str, config_version: &str) -> Vec<u8> {
    proto::AuthAttemptStarted {
        auth_request_id: auth_request_id.to_string(),
        worker_id: worker_id.to_owned(),
        restaurant_payment_config_version: config_version.to_owned(),
        started_at: Utc::now().timestamp(),
    }
    .encode_to_vec()
}

pub fn response_authorized(auth_request_id: Uuid, result: &AuthorizedResult) -> Vec<u8> {
    proto::AuthResponseReceived {
        auth_request_id: auth_request_id.to_string(),
        status: proto::AuthStatus::Authorized as i32,
        result: Some(proto::AuthorizationResult {
            processor_name: result.processor_name.clone(),
            processor_auth_id: result.processor_auth_id.clone(),
            authorization_code: result.authorization_code.clone(),
            authorized_amount_minor: result.authorized_amount_minor,
            currency: result.currency.clone(),
            authorized_at: result.authorized_at.timestamp(),
            denial_code: String::new(),
            denial_reason: String::new(),
        }),
        received_at: Utc::now().timestamp(),
    }
    .encode_to_vec()
}

pub fn response_denied(auth_request_id: Uuid, result: &DeniedResult) -> Vec<u8> {
    proto::AuthResponseReceived {
        auth_request_id: auth_request_id.to_string(),
        status: proto::AuthStatus::Denied as i32,
        result: Some(proto::AuthorizationResult {
            processor_name: result.processor_name.clone(),
            processor_auth_id: String::new(),
            authorization_code: String::new(),
            authorized_amount_minor: 0,
            currency: String::new(),
            authorized_at: 0,
            denial_code: result.denial_code.clone(),
            denial_reason: result.denial_reason.clone(),
        }),
        received_at: Utc::now().timestamp(),
    }
    .encode_to_vec()
}

pub fn attempt_failed(
    auth_request_id: Uuid,
    error_code: &str,
    error_message: &str,
    is_retryable: bool,
    retry_count: u32,
) -> Vec<u8> {
    proto::AuthAttemptFailed {
        auth_request_id: auth_request_id.to_string(),
        error_message: error_message.to_owned(),
        error_code: error_code.to_owned(),
        is_retryable,
        retry_count,
        failed_at: Utc::now().timestamp(),
    }
    .encode_to_vec()
}

pub fn request_expired(auth_request_id: Uuid, reason: &str) -> Vec<u8> {
    proto::AuthRequestExpired {
        auth_request_id: auth_request_id.to_string(),
        reason: reason.to_owned(),
        expired_at: Utc::now().timestamp(),
    }
    .encode_to_vec()
}

pub fn void_completed(auth_request_id: Uuid, result: &VoidResult) -> Vec<u8> {
    proto::AuthVoidCompleted {
        auth_request_id: auth_request_id.to_string(),
        processor_void_id: result.processor_void_id.clone(),
        voided_at: result.voided_at.timestamp(),
    }
    .encode_to_vec()
}
