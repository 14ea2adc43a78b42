//! Authorization request state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of an authorization request as held in the read model.
///
/// Progression is strictly monotone: `Pending → Processing → terminal`, with
/// the single post-terminal edge `Authorized → Voided`. No other state ever
/// regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthStatus {
    Pending,
    Processing,
    Authorized,
    Denied,
    Failed,
    Expired,
    Voided,
}

impl AuthStatus {
    /// Terminal states never transition again, except `Authorized → Voided`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Authorized | Self::Denied | Self::Failed | Self::Expired | Self::Voided
        )
    }

    /// Whether a transition from `self` to `next` is legal.
    pub fn can_transition_to(self, next: AuthStatus) -> bool {
        use AuthStatus::*;
        match (self, next) {
            (Pending, Processing) => true,
            (Pending, Expired) => true,
            (Processing, Authorized | Denied | Failed | Expired) => true,
            // Retryable failures keep the request in Processing.
            (Processing, Processing) => true,
            (Authorized, Voided) => true,
            _ => false,
        }
    }

    /// Database string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Authorized => "AUTHORIZED",
            Self::Denied => "DENIED",
            Self::Failed => "FAILED",
            Self::Expired => "EXPIRED",
            Self::Voided => "VOIDED",
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unrecognized status string.
#[derive(Debug, thiserror::Error)]
#[error("unknown auth status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for AuthStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "AUTHORIZED" => Ok(Self::Authorized),
            "DENIED" => Ok(Self::Denied),
            "FAILED" => Ok(Self::Failed),
            "EXPIRED" => Ok(Self::Expired),
            "VOIDED" => Ok(Self::Voided),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_mark_only_final_states_terminal() {
        assert!(!AuthStatus::Pending.is_terminal());
        assert!(!AuthStatus::Processing.is_terminal());
        assert!(AuthStatus::Authorized.is_terminal());
        assert!(AuthStatus::Denied.is_terminal());
        assert!(AuthStatus::Failed.is_terminal());
        assert!(AuthStatus::Expired.is_terminal());
        assert!(AuthStatus::Voided.is_terminal());
    }

    #[test]
    fn should_allow_void_only_after_authorized() {
        assert!(AuthStatus::Authorized.can_transition_to(AuthStatus::Voided));
        assert!(!AuthStatus::Denied.can_transition_to(AuthStatus::Voided));
        assert!(!AuthStatus::Pending.can_transition_to(AuthStatus::Voided));
    }

    #[test]
    fn should_never_regress_from_terminal() {
        for terminal in [
            AuthStatus::Denied,
            AuthStatus::Failed,
            AuthStatus::Expired,
            AuthStatus::Voided,
        ] {
            assert!(!terminal.can_transition_to(AuthStatus::Pending));
            assert!(!terminal.can_transition_to(AuthStatus::Processing));
            assert!(!terminal.can_transition_to(AuthStatus::Authorized));
        }
    }

    #[test]
    fn should_round_trip_status_strings() {
        for status in [
            AuthStatus::Pending,
            AuthStatus::Processing,
            AuthStatus::Authorized,
            AuthStatus::Denied,
            AuthStatus::Failed,
            AuthStatus::Expired,
            AuthStatus::Voided,
        ] {
            assert_eq!(status.as_str().parse::<AuthStatus>().unwrap(), status);
        }
        assert!("BOGUS".parse::<AuthStatus>().is_err());
    }
}
