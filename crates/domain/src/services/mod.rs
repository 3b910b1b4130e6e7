//! Domain services for App Shop.
//!
//! Services contain business logic that operates on domain models.

pub mod calendar;
pub mod commission;
pub mod entitlement;
pub mod ports;
pub mod pricing;
pub mod withdrawal;

pub use calendar::BusinessCalendar;

pub use commission::{
    plan_emission, resolve_tier, settlement_for, validate_tier_set, CommissionEmission, Settlement,
};

pub use entitlement::{
    best_for_platform, decide, download_candidates, Entitlement, EntitlementInput, MembershipChoice,
};

pub use ports::{
    AccountCipher, CallbackVerifier, HmacCallbackVerifier, MockObjectStore, ObjectStore,
    SignedRequest,
};

pub use pricing::{quote_order, upgrade_credit, OrderQuote};

pub use withdrawal::{quote_withdrawal, DAILY_WITHDRAW_LIMIT_MESSAGE};
