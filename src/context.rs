use near_sdk::{env, AccountId, NearToken, Timestamp};

/// What the runtime tells us about the call being executed.
#[derive(Clone, Debug)]
pub struct CallContext {
    pub caller: AccountId,
    pub attached: NearToken,
    pub now: Timestamp,
}

impl CallContext {
    pub fn current() -> Self {
        Self {
            caller: env::predecessor_account_id(),
            attached: env::attached_deposit(),
            now: env::block_timestamp(),
        }
    }
}
