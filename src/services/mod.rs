pub mod payment_verification;

pub use payment_verification::{
    PaymentVerificationService, VerificationError, VerificationOutcome,
};
