use uuid::Uuid;

use crate::domain::repository::AuthRequestRepository;
use crate::domain::types::AuthRequestSnapshot;
use crate::error::AuthorizationError;

pub struct GetStatusUseCase<R: AuthRequestRepository> {
    pub repo: R,
}

impl<R: AuthRequestRepository> GetStatusUseCase<R> {
    /// Authoritative outcome view; keeps returning the same terminal payload
    /// indefinitely. Unknown and foreign ids are both `NotFound`.
    pub async fn execute(
        &self,
        restaurant_id: Uuid,
        auth_request_id: Uuid,
    ) -> Result<AuthRequestSnapshot, AuthorizationError> {
        self.repo
            .snapshot_for(restaurant_id, auth_request_id)
            .await?
            .ok_or(AuthorizationError::NotFound)
    }
}
