use chrono::Utc;
use uuid::Uuid;

use tably_domain::card::CardMetadata;
use tably_domain::id::PaymentTokenId;

use crate::domain::repository::TokenRepository;
use crate::error::TokenServiceError;

#[derive(Debug)]
pub struct GetTokenOutput {
    pub token_id: PaymentTokenId,
    pub metadata: CardMetadata,
    pub created_at: chrono::DateTime<Utc>,
    pub expires_at: chrono::DateTime<Utc>,
}

pub struct GetTokenUseCase<T: TokenRepository> {
    pub tokens: T,
}

impl<T: TokenRepository> GetTokenUseCase<T> {
    /// Metadata-only lookup. An unknown token and a token owned by another
    /// restaurant are indistinguishable to the caller.
    pub async fn execute(
        &self,
        token_id: &PaymentTokenId,
        restaurant_id: Uuid,
    ) -> Result<GetTokenOutput, TokenServiceError> {
        let record = self
            .tokens
            .find(token_id)
            .await?
            .filter(|record| record.restaurant_id == restaurant_id)
            .ok_or(TokenServiceError::NotFound)?;

        if record.is_expired(Utc::now()) {
            return Err(TokenServiceError::Expired);
        }

        Ok(GetTokenOutput {
            token_id: record.token_id,
            metadata: record.metadata,
            created_at: record.created_at,
            expires_at: record.expires_at,
        })
    }
}
