use near_sdk::{AccountId, FunctionError};
use thiserror::Error;

use crate::guard::GuardedAction;

/// Every failure a lending or market call can end with.
///
/// Entry points return this through `#[handle_result]`, so an `Err` panics with
/// the Display text and the whole call (state and queued transfers) is dropped.
/// Messages start with the variant name so callers can match on the cause.
#[derive(Debug, Clone, PartialEq, Eq, Error, FunctionError)]
pub enum LendingError {
    #[error("NotFound: no {kind} with id {id}")]
    NotFound { kind: &'static str, id: u64 },

    #[error("InvalidState: {0}")]
    InvalidState(&'static str),

    #[error("Unauthorized: {0} may not perform this action")]
    Unauthorized(AccountId),

    #[error("AlreadyDone: {0:?} has already happened")]
    AlreadyDone(GuardedAction),

    #[error("AmountMismatch: expected {expected} yoctoNEAR, attached {attached}")]
    AmountMismatch { expected: u128, attached: u128 },

    #[error("Underflow: collateral {collateral} is less than total {total}")]
    Underflow { collateral: u128, total: u128 },

    #[error("InvalidArgument: {0}")]
    InvalidArgument(&'static str),

    #[error("Overflow: amount arithmetic overflowed")]
    Overflow,

    #[error("InsufficientCustody: requested {requested} yoctoNEAR, available {available}")]
    InsufficientCustody { requested: u128, available: u128 },
}

pub type LendingResult<T> = Result<T, LendingError>;
