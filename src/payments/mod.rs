//! Payment order lifecycle with a fixed expiration horizon.

pub mod domain;
pub mod ledger;

#[cfg(test)]
mod tests;

pub use domain::{PaymentMethod, PaymentOrderId, PaymentOrderRecord, PaymentStatus};
pub use ledger::{PaymentError, PaymentLedger, PaymentStore, PAYMENT_EXPIRY_HOURS};
