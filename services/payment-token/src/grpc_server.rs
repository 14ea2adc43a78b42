use tonic::{Request, Response, Status};

use tably_proto::payments::v1::payment_token_service_server::PaymentTokenService;
use tably_proto::payments::v1::{
    DecryptPaymentTokenRequest, DecryptPaymentTokenResponse, PaymentData as PaymentDataProto,
};

use crate::error::TokenServiceError;
use crate::state::AppState;
use crate::usecase::decrypt_token::{DecryptTokenInput, DecryptTokenUseCase};

const SERVICE_AUTH_METADATA: &str = "x-service-auth";
const REQUEST_ID_METADATA: &str = "x-request-id";

/// Internal decrypt surface.
///
/// The caller's service identity is bound into the `x-service-auth`
/// credential (`service:{name}:{secret}`): the secret authenticates the
/// caller, the name is what the usecase checks against the allow-list. A
/// caller can never claim an identity its credential does not carry.
#[derive(Clone)]
pub struct TokenGrpcServer {
    pub state: AppState,
}

impl TokenGrpcServer {
    /// Authenticate the request and return the caller's service name.
    fn authenticate<T>(&self, request: &Request<T>) -> Result<String, Status> {
        let presented = request
            .metadata()
            .get(SERVICE_AUTH_METADATA)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Status::unauthenticated("missing service auth"))?;
        parse_service_credential(presented, &self.state.service_auth_token)
            .ok_or_else(|| Status::unauthenticated("invalid service auth"))
    }
}

/// Parse a `service:{name}:{secret}` credential, returning the service name
/// iff the secret matches.
fn parse_service_credential(credential: &str, expected_secret: &str) -> Option<String> {
    let rest = credential.strip_prefix("service:")?;
    let (name, secret) = rest.split_once(':')?;
    if name.is_empty() || secret != expected_secret {
        return None;
    }
    Some(name.to_owned())
}

#[tonic::async_trait]
impl PaymentTokenService for TokenGrpcServer {
    async fn decrypt(
        &self,
        request: Request<DecryptPaymentTokenRequest>,
    ) -> Result<Response<DecryptPaymentTokenResponse>, Status> {
        let requesting_service = self.authenticate(&request)?;

        let correlation_id = request
            .metadata()
            .get(REQUEST_ID_METADATA)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let req = request.into_inner();
        let token_id = req
            .payment_token
            .parse()
            .map_err(|_| Status::not_found("token not found"))?;
        let restaurant_id = req
            .restaurant_id
            .parse()
            .map_err(|_| Status::invalid_argument("invalid restaurant_id"))?;

        let usecase = DecryptTokenUseCase {
            tokens: self.state.token_repo(),
            keys: self.state.key_store(),
            audit: self.state.audit_repo(),
            allowed_services: self.state.allowed_services.as_ref().clone(),
        };

        let data = usecase
            .execute(DecryptTokenInput {
                token_id,
                restaurant_id,
                requesting_service,
                correlation_id,
            })
            .await
            .map_err(status_from_error)?;

        Ok(Response::new(DecryptPaymentTokenResponse {
            payment_data: Some(PaymentDataProto {
                card_number: data.card_number.clone(),
                exp_month: data.exp_month,
                exp_year: data.exp_year,
                cvv: data.cvv.clone().unwrap_or_default(),
                cardholder_name: data.cardholder_name.clone().unwrap_or_default(),
            }),
        }))
    }
}

fn status_from_error(error: TokenServiceError) -> Status {
    match error {
        TokenServiceError::NotFound => Status::not_found("token not found"),
        TokenServiceError::Forbidden => Status::permission_denied("forbidden"),
        TokenServiceError::Expired => Status::failed_precondition("token expired"),
        TokenServiceError::Unauthenticated => Status::unauthenticated("unauthenticated"),
        TokenServiceError::Validation(message) => Status::invalid_argument(message),
        other => Status::internal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_service_credential;

    #[test]
    fn should_extract_service_name_from_valid_credential() {
        let name = parse_service_credential("service:auth-processor-worker:s3cret", "s3cret");
        assert_eq!(name.as_deref(), Some("auth-processor-worker"));
    }

    #[test]
    fn should_reject_wrong_secret() {
        assert!(parse_service_credential("service:auth-processor-worker:nope", "s3cret").is_none());
    }

    #[test]
    fn should_reject_malformed_credentials() {
        assert!(parse_service_credential("auth-processor-worker:s3cret", "s3cret").is_none());
        assert!(parse_service_credential("service:auth-processor-worker", "s3cret").is_none());
        assert!(parse_service_credential("service::s3cret", "s3cret").is_none());
        assert!(parse_service_credential("", "s3cret").is_none());
    }

    #[test]
    fn should_keep_colons_in_secret_out_of_the_name() {
        // Only the first separator splits; the secret may contain colons.
        let name = parse_service_credential("service:worker:a:b", "a:b");
        assert_eq!(name.as_deref(), Some("worker"));
    }
}
