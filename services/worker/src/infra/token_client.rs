use tonic::Code;
use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use uuid::Uuid;

use tably_domain::card::PaymentData;
use tably_proto::payments::v1::DecryptPaymentTokenRequest;
use tably_proto::payments::v1::payment_token_service_client::PaymentTokenServiceClient;

use crate::domain::repository::TokenDecryptor;
use crate::domain::types::TokenDecryptError;

const SERVICE_AUTH_METADATA: &str = "x-service-auth";
const REQUEST_ID_METADATA: &str = "x-request-id";

/// gRPC client for the token service's internal decrypt surface.
///
/// The worker's identity travels inside the auth credential itself
/// (`service:{name}:{secret}`); the token service takes the allow-listed
/// service name from there, so there is no separate self-reported field to
/// spoof.
#[derive(Clone)]
pub struct GrpcTokenDecryptor {
    client: PaymentTokenServiceClient<Channel>,
    credential: String,
}

impl GrpcTokenDecryptor {
    pub fn new(channel: Channel, service_auth_token: String, requesting_service: String) -> Self {
        Self {
            client: PaymentTokenServiceClient::new(channel),
            credential: format!("service:{requesting_service}:{service_auth_token}"),
        }
    }
}

impl TokenDecryptor for GrpcTokenDecryptor {
    async fn decrypt(
        &self,
        payment_token: &str,
        restaurant_id: Uuid,
        correlation_id: Option<&str>,
    ) -> Result<PaymentData, TokenDecryptError> {
        let mut request = tonic::Request::new(DecryptPaymentTokenRequest {
            payment_token: payment_token.to_owned(),
            restaurant_id: restaurant_id.to_string(),
        });

        let auth: MetadataValue<_> = self
            .credential
            .parse()
            .map_err(|_| TokenDecryptError::Unavailable("invalid service auth token".into()))?;
        request.metadata_mut().insert(SERVICE_AUTH_METADATA, auth);
        if let Some(correlation_id) = correlation_id {
            if let Ok(value) = correlation_id.parse() {
                request.metadata_mut().insert(REQUEST_ID_METADATA, value);
            }
        }

        let response = self
            .client
            .clone()
            .decrypt(request)
            .await
            .map_err(classify_status)?;

        let proto = response
            .into_inner()
            .payment_data
            .ok_or_else(|| TokenDecryptError::Unavailable("empty decrypt response".into()))?;

        Ok(PaymentData {
            card_number: proto.card_number,
            exp_month: proto.exp_month,
            exp_year: proto.exp_year,
            cvv: (!proto.cvv.is_empty()).then_some(proto.cvv),
            cardholder_name: (!proto.cardholder_name.is_empty()).then_some(proto.cardholder_name),
            billing_zip: None,
        })
    }
}

fn classify_status(status: tonic::Status) -> TokenDecryptError {
    match status.code() {
        Code::NotFound => TokenDecryptError::NotFound,
        Code::PermissionDenied | Code::Unauthenticated => TokenDecryptError::Forbidden,
        Code::FailedPrecondition => TokenDecryptError::Expired,
        // Unavailable, DeadlineExceeded, Internal, transport trouble: the
        // token service may recover, so the attempt is retryable.
        _ => TokenDecryptError::Unavailable(status.to_string()),
    }
}
