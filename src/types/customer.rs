//! Customer record data structures

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Raw CRM attributes of one prospect or customer, as received from the caller.
///
/// Range checks are declared here but only enforced at the request boundary;
/// the feature extractor accepts whatever values it is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CustomerRecord {
    /// Opaque customer identifier, unique within a request
    pub customer_id: i64,

    /// Days since the last interaction (recency)
    #[validate(range(min = 0))]
    pub days_since_last_contact: i64,

    /// Number of interactions so far (frequency)
    #[validate(range(min = 0))]
    pub total_contacts: i64,

    /// Total purchase amount in currency units (monetary)
    #[validate(range(min = 0.0))]
    pub total_spent: f64,

    /// Marketing emails sent to the customer
    #[validate(range(min = 0))]
    pub emails_sent: i64,

    /// Marketing emails opened; may exceed `emails_sent`, which is not checked
    #[validate(range(min = 0))]
    pub emails_opened: i64,

    /// Website visits attributed to the customer
    #[validate(range(min = 0))]
    pub website_visits: i64,

    /// Days since the customer record was created
    #[validate(range(min = 0))]
    pub customer_age_days: i64,
}

impl CustomerRecord {
    /// Create an all-zero record for the given customer
    pub fn new(customer_id: i64) -> Self {
        Self {
            customer_id,
            days_since_last_contact: 0,
            total_contacts: 0,
            total_spent: 0.0,
            emails_sent: 0,
            emails_opened: 0,
            website_visits: 0,
            customer_age_days: 0,
        }
    }
}
