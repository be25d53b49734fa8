//! Creator payout destinations (UPI or bank account).

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::ActorId;
use crate::error::SettlementError;

/// How a withdrawal is paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PayoutMethod {
    /// UPI virtual payment address.
    Upi,
    /// Bank transfer (account number + IFSC).
    Bank,
}

impl fmt::Display for PayoutMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Upi => "upi",
            Self::Bank => "bank",
        })
    }
}

/// Payout fields as supplied by a creator. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PayoutFields {
    /// UPI id, for [`PayoutMethod::Upi`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_id: Option<String>,
    /// Account number, for [`PayoutMethod::Bank`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_account: Option<String>,
    /// Branch IFSC, for [`PayoutMethod::Bank`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ifsc: Option<String>,
    /// Account holder, for [`PayoutMethod::Bank`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_holder_name: Option<String>,
}

fn present(field: Option<&String>) -> bool {
    field.is_some_and(|v| !v.trim().is_empty())
}

impl PayoutFields {
    /// Names of the fields `method` needs that are missing or blank.
    #[must_use]
    pub fn missing_for(&self, method: PayoutMethod) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match method {
            PayoutMethod::Upi => {
                if !present(self.upi_id.as_ref()) {
                    missing.push("upi_id");
                }
            }
            PayoutMethod::Bank => {
                if !present(self.bank_account.as_ref()) {
                    missing.push("bank_account");
                }
                if !present(self.ifsc.as_ref()) {
                    missing.push("ifsc");
                }
            }
        }
        missing
    }

    /// Fills blank fields from `saved`.
    #[must_use]
    pub fn or_saved(self, saved: &Self) -> Self {
        let pick = |own: Option<String>, fallback: &Option<String>| {
            if present(own.as_ref()) { own } else { fallback.clone() }
        };
        Self {
            upi_id: pick(self.upi_id, &saved.upi_id),
            bank_account: pick(self.bank_account, &saved.bank_account),
            ifsc: pick(self.ifsc, &saved.ifsc),
            account_holder_name: pick(self.account_holder_name, &saved.account_holder_name),
        }
    }

    /// Validates the fields for `method`.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::IncompletePayoutDetails`] naming the
    /// missing fields.
    pub fn require(&self, method: PayoutMethod) -> Result<(), SettlementError> {
        let missing = self.missing_for(method);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SettlementError::IncompletePayoutDetails(missing))
        }
    }
}

/// A creator's saved payout destination.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayoutDetails {
    /// Preferred method.
    pub payout_method: PayoutMethod,
    /// Destination fields.
    #[serde(flatten)]
    pub fields: PayoutFields,
    /// Last update.
    pub updated_at: DateTime<Utc>,
}

/// Store of saved payout details, keyed by creator.
#[derive(Debug, Default)]
pub struct PayoutDetailsBook {
    details: RwLock<HashMap<ActorId, PayoutDetails>>,
}

impl PayoutDetailsBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves details for a creator after validating them.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::IncompletePayoutDetails`] if `fields`
    /// lack what `method` needs.
    pub async fn save(
        &self,
        creator: ActorId,
        method: PayoutMethod,
        fields: PayoutFields,
    ) -> Result<PayoutDetails, SettlementError> {
        fields.require(method)?;
        let details = PayoutDetails {
            payout_method: method,
            fields,
            updated_at: Utc::now(),
        };
        self.details.write().await.insert(creator, details.clone());
        Ok(details)
    }

    /// Saved details of a creator.
    pub async fn get(&self, creator: ActorId) -> Option<PayoutDetails> {
        self.details.read().await.get(&creator).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_requires_account_and_ifsc() {
        let fields = PayoutFields {
            bank_account: Some("0012345".into()),
            ifsc: Some("   ".into()),
            ..PayoutFields::default()
        };
        assert_eq!(fields.missing_for(PayoutMethod::Bank), vec!["ifsc"]);
        assert_eq!(fields.missing_for(PayoutMethod::Upi), vec!["upi_id"]);
    }

    #[test]
    fn request_fields_fall_back_to_saved() {
        let saved = PayoutFields {
            upi_id: Some("creator@upi".into()),
            ..PayoutFields::default()
        };
        let merged = PayoutFields::default().or_saved(&saved);
        assert!(merged.require(PayoutMethod::Upi).is_ok());

        let explicit = PayoutFields {
            upi_id: Some("other@upi".into()),
            ..PayoutFields::default()
        }
        .or_saved(&saved);
        assert_eq!(explicit.upi_id.as_deref(), Some("other@upi"));
    }

    #[tokio::test]
    async fn save_rejects_incomplete_details() {
        let book = PayoutDetailsBook::new();
        let creator = ActorId::new();
        let result = book
            .save(creator, PayoutMethod::Bank, PayoutFields::default())
            .await;
        assert!(matches!(
            result,
            Err(SettlementError::IncompletePayoutDetails(_))
        ));
        assert!(book.get(creator).await.is_none());
    }
}
