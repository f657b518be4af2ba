use near_sdk::{env, AccountId, NearToken};

use crate::request::{RequestId, RequestStatus};

// Helpers for consistent logging
pub fn log_status_changed(request_id: RequestId, status: RequestStatus) {
    env::log_str(&format!(
        "LENDING_STATUS_CHANGED: request_id='{}', status='{:?}'",
        request_id, status
    ));
}

pub fn log_lending_event(event: &str, request_id: RequestId, actor: &AccountId, amount: NearToken) {
    env::log_str(&format!(
        "LENDING_{}: request_id='{}', actor='{}', amount='{}'",
        event,
        request_id,
        actor,
        amount.as_yoctonear()
    ));
}

pub fn log_listing_event(event: &str, token_id: RequestId, actor: &AccountId, amount: NearToken) {
    env::log_str(&format!(
        "LISTING_{}: token_id='{}', actor='{}', amount='{}'",
        event,
        token_id,
        actor,
        amount.as_yoctonear()
    ));
}

pub fn log_payout_event(event: &str, receiver: &AccountId, amount: NearToken) {
    env::log_str(&format!(
        "PAYOUT_{}: receiver='{}', amount='{}'",
        event,
        receiver,
        amount.as_yoctonear()
    ));
}
