//! Per-request caller identity.
//!
//! The engine never reads ambient session state: every operation that
//! needs to know who is calling receives an [`Identity`] explicitly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ActorId;
use crate::error::SettlementError;

/// Role of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Funds campaigns.
    Brand,
    /// Submits clips and earns payouts.
    Creator,
    /// Reviews clips and resolves refunds.
    Admin,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Brand => "brand",
            Self::Creator => "creator",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brand" => Ok(Self::Brand),
            "creator" => Ok(Self::Creator),
            "admin" => Ok(Self::Admin),
            other => Err(SettlementError::InvalidRequest(format!(
                "unknown role: {other}"
            ))),
        }
    }
}

/// Owner type of a wallet or ledger entry.
///
/// `Platform` never owns a wallet; it only appears on commission
/// bookkeeping transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// A brand account.
    Brand,
    /// A creator account.
    Creator,
    /// The marketplace itself.
    Platform,
}

impl ActorKind {
    /// Wire name of the actor kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Brand => "brand",
            Self::Creator => "creator",
            Self::Platform => "platform",
        }
    }
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorKind {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brand" => Ok(Self::Brand),
            "creator" => Ok(Self::Creator),
            "platform" => Ok(Self::Platform),
            other => Err(SettlementError::InvalidRequest(format!(
                "unknown user type: {other}"
            ))),
        }
    }
}

/// Key of a wallet: `(actor_type, actor_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct ActorRef {
    /// Owner type.
    pub kind: ActorKind,
    /// Owner id.
    pub id: ActorId,
}

impl ActorRef {
    /// Brand wallet key.
    #[must_use]
    pub const fn brand(id: ActorId) -> Self {
        Self {
            kind: ActorKind::Brand,
            id,
        }
    }

    /// Creator wallet key.
    #[must_use]
    pub const fn creator(id: ActorId) -> Self {
        Self {
            kind: ActorKind::Creator,
            id,
        }
    }
}

impl ActorRef {
    /// Account that platform commission entries are booked against.
    pub const PLATFORM: Self = Self {
        kind: ActorKind::Platform,
        id: ActorId::from_uuid(uuid::Uuid::nil()),
    };
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// Caller role.
    pub role: Role,
    /// Caller account id.
    pub actor_id: ActorId,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub const fn new(role: Role, actor_id: ActorId) -> Self {
        Self { role, actor_id }
    }

    /// Returns `true` for administrators.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Wallet key for brand and creator callers; `None` for admins.
    #[must_use]
    pub const fn wallet(&self) -> Option<ActorRef> {
        match self.role {
            Role::Brand => Some(ActorRef::brand(self.actor_id)),
            Role::Creator => Some(ActorRef::creator(self.actor_id)),
            Role::Admin => None,
        }
    }

    /// Requires a specific role.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] if the caller has another role.
    pub fn require(&self, role: Role) -> Result<(), SettlementError> {
        if self.role == role {
            return Ok(());
        }
        Err(SettlementError::Forbidden(format!(
            "operation requires the {role} role"
        )))
    }

    /// Requires the caller to be the given actor, or an admin.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] otherwise.
    pub fn require_self_or_admin(&self, actor: ActorRef) -> Result<(), SettlementError> {
        if self.is_admin() || self.wallet() == Some(actor) {
            return Ok(());
        }
        Err(SettlementError::Forbidden(
            "cannot access another account's ledger".to_string(),
        ))
    }
}
