use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::procedures::domain::ProcedureId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentOrderId(pub String);

impl fmt::Display for PaymentOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
}

impl PaymentMethod {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cash => "Cash",
            Self::Card => "Card",
            Self::BankTransfer => "Bank Transfer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Accredited,
    Rejected,
    Expired,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Accredited => "Accredited",
            Self::Rejected => "Rejected",
            Self::Expired => "Expired",
        }
    }
}

/// One payment order on a procedure. Orders that are not accredited before
/// `expires_at` are swept to `Expired`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOrderRecord {
    pub id: PaymentOrderId,
    pub procedure_id: ProcedureId,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accredited_at: Option<DateTime<Utc>>,
    pub receipt_ref: Option<String>,
    pub rejection_reason: Option<String>,
}

impl PaymentOrderRecord {
    pub fn is_accredited(&self) -> bool {
        self.status == PaymentStatus::Accredited
    }
}
