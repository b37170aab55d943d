//! Database enum types mapped to Postgres native enums.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Loan plan status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "plan_status")]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// Accepting installment payments.
    #[sea_orm(string_value = "active")]
    Active,
    /// All dues cleared.
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Closed administratively.
    #[sea_orm(string_value = "closed")]
    Closed,
    /// Marked defaulted.
    #[sea_orm(string_value = "defaulted")]
    Defaulted,
}

/// Payment method column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "payment_method")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash at the counter.
    #[sea_orm(string_value = "cash")]
    Cash,
    /// Credit/debit card, entered manually.
    #[sea_orm(string_value = "card")]
    Card,
    /// Bank transfer.
    #[sea_orm(string_value = "netbanking")]
    Netbanking,
    /// Cheque.
    #[sea_orm(string_value = "cheque")]
    Cheque,
    /// Hosted-checkout authorization (external channel).
    #[sea_orm(string_value = "checkout")]
    Checkout,
}

impl PaymentMethod {
    /// Parses a manual-channel method name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(Self::Cash),
            "card" => Some(Self::Card),
            "netbanking" => Some(Self::Netbanking),
            "cheque" => Some(Self::Cheque),
            _ => None,
        }
    }

    /// Maps a payment channel to the stored method and external reference.
    ///
    /// Returns `None` when a manual channel names an unknown method.
    #[must_use]
    pub fn from_channel(
        channel: &vantra_core::finance::PaymentChannel,
    ) -> Option<(Self, Option<String>)> {
        use vantra_core::finance::PaymentChannel;
        match channel {
            PaymentChannel::Manual { method } => Self::parse(method).map(|m| (m, None)),
            PaymentChannel::External { reference } => {
                Some((Self::Checkout, Some(reference.clone())))
            }
        }
    }
}

/// Payment status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "payment_status")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Recorded but not settled.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Money received.
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Authorization or settlement failed.
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl From<vantra_core::finance::PlanStatus> for PlanStatus {
    fn from(status: vantra_core::finance::PlanStatus) -> Self {
        use vantra_core::finance::PlanStatus as Core;
        match status {
            Core::Active => Self::Active,
            Core::Completed => Self::Completed,
            Core::Closed => Self::Closed,
            Core::Defaulted => Self::Defaulted,
        }
    }
}

impl From<PlanStatus> for vantra_core::finance::PlanStatus {
    fn from(status: PlanStatus) -> Self {
        match status {
            PlanStatus::Active => Self::Active,
            PlanStatus::Completed => Self::Completed,
            PlanStatus::Closed => Self::Closed,
            PlanStatus::Defaulted => Self::Defaulted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_parse() {
        assert_eq!(PaymentMethod::parse("cash"), Some(PaymentMethod::Cash));
        assert_eq!(PaymentMethod::parse("card"), Some(PaymentMethod::Card));
        assert_eq!(
            PaymentMethod::parse("netbanking"),
            Some(PaymentMethod::Netbanking)
        );
        assert_eq!(PaymentMethod::parse("cheque"), Some(PaymentMethod::Cheque));
        // "checkout" is reserved for the external channel.
        assert_eq!(PaymentMethod::parse("checkout"), None);
        assert_eq!(PaymentMethod::parse("bitcoin"), None);
    }

    #[test]
    fn test_from_channel() {
        use vantra_core::finance::PaymentChannel;

        let manual = PaymentChannel::Manual {
            method: "card".to_string(),
        };
        assert_eq!(
            PaymentMethod::from_channel(&manual),
            Some((PaymentMethod::Card, None))
        );

        let external = PaymentChannel::External {
            reference: "cs_test_123".to_string(),
        };
        assert_eq!(
            PaymentMethod::from_channel(&external),
            Some((PaymentMethod::Checkout, Some("cs_test_123".to_string())))
        );

        let bogus = PaymentChannel::Manual {
            method: "checkout".to_string(),
        };
        assert_eq!(PaymentMethod::from_channel(&bogus), None);
    }

    #[test]
    fn test_plan_status_roundtrip() {
        use vantra_core::finance::PlanStatus as Core;
        for core in [Core::Active, Core::Completed, Core::Closed, Core::Defaulted] {
            let db: PlanStatus = core.into();
            let back: Core = db.into();
            assert_eq!(core, back);
        }
    }
}
