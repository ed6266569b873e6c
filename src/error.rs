use thiserror::Error;

/// Every error the broker core can return, tagged with the stable wire code
/// from the external interface contract (§7 / §6 of the design doc).
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("entity already exists: {0}")]
    EntityAlreadyExists(String),

    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("message not found: {0}")]
    MessageNotFound(String),

    #[error("message lock lost")]
    MessageLockLost,

    #[error("message too large: {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("rule not found: {0}")]
    RuleNotFound(String),

    #[error("rule already exists: {0}")]
    RuleAlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("session lock lost")]
    SessionLockLost,

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, BrokerError>;

impl BrokerError {
    /// The stable machine-readable code as it appears on the wire (§6, §7).
    pub fn code(&self) -> &'static str {
        match self {
            BrokerError::EntityNotFound(_) => "EntityNotFound",
            BrokerError::EntityAlreadyExists(_) => "EntityAlreadyExists",
            BrokerError::InvalidName { .. } => "InvalidName",
            BrokerError::QuotaExceeded(_) => "QuotaExceeded",
            BrokerError::MessageNotFound(_) => "MessageNotFound",
            BrokerError::MessageLockLost => "MessageLockLost",
            BrokerError::MessageTooLarge { .. } => "MessageTooLarge",
            BrokerError::RuleNotFound(_) => "RuleNotFound",
            BrokerError::RuleAlreadyExists(_) => "RuleAlreadyExists",
            BrokerError::InvalidArgument(_) => "InvalidArgument",
            BrokerError::SessionLockLost => "SessionLockLost",
            BrokerError::Internal(_) => "Internal",
        }
    }
}
