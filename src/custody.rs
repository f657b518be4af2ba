use near_sdk::{env, near, AccountId, Gas, NearToken, Promise};

use crate::error::{LendingError, LendingResult};
use crate::ext_self;

const SETTLEMENT_CALLBACK_GAS: Gas = Gas::from_tgas(10);

/// Outbound payment from the contract's own balance.
pub trait Custody {
    fn send(&mut self, receiver_id: &AccountId, amount: NearToken) -> LendingResult<()>;

    /// Sends every payout or none of them.
    fn send_all(&mut self, payouts: &[(AccountId, NearToken)]) -> LendingResult<()>;
}

#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payout {
    pub receiver_id: AccountId,
    pub amount: NearToken,
}

/// Collects the payouts of one call and releases them as transfer receipts
/// once every state change of the call is in place.
pub struct PayoutQueue {
    payouts: Vec<Payout>,
    queued: NearToken,
}

impl PayoutQueue {
    pub fn new() -> Self {
        Self {
            payouts: Vec::new(),
            queued: NearToken::from_yoctonear(0),
        }
    }

    pub fn payouts(&self) -> &[Payout] {
        &self.payouts
    }

    /// Schedules the transfers followed by a settlement callback on this
    /// contract. Returns `None` when nothing was queued.
    pub fn dispatch(self) -> Option<Promise> {
        let mut transfers = self
            .payouts
            .iter()
            .map(|payout| Promise::new(payout.receiver_id.clone()).transfer(payout.amount));
        let first = transfers.next()?;
        let batch = transfers.fold(first, |batch, transfer| batch.and(transfer));

        Some(
            batch.then(
                ext_self::ext(env::current_account_id())
                    .with_static_gas(SETTLEMENT_CALLBACK_GAS)
                    .on_payouts_settled(self.payouts),
            ),
        )
    }
}

impl Default for PayoutQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PayoutQueue {
    /// Books `amount` against the contract balance without queuing anything.
    fn reserve(&mut self, amount: NearToken) -> LendingResult<()> {
        let queued = self
            .queued
            .checked_add(amount)
            .ok_or(LendingError::Overflow)?;
        let available = env::account_balance();
        if queued > available {
            return Err(LendingError::InsufficientCustody {
                requested: queued.as_yoctonear(),
                available: available.as_yoctonear(),
            });
        }
        self.queued = queued;
        Ok(())
    }

    fn push(&mut self, receiver_id: &AccountId, amount: NearToken) {
        if amount.as_yoctonear() > 0 {
            self.payouts.push(Payout {
                receiver_id: receiver_id.clone(),
                amount,
            });
        }
    }
}

impl Custody for PayoutQueue {
    fn send(&mut self, receiver_id: &AccountId, amount: NearToken) -> LendingResult<()> {
        self.reserve(amount)?;
        self.push(receiver_id, amount);
        Ok(())
    }

    fn send_all(&mut self, payouts: &[(AccountId, NearToken)]) -> LendingResult<()> {
        let total = payouts
            .iter()
            .try_fold(NearToken::from_yoctonear(0), |total, (_, amount)| {
                total.checked_add(*amount)
            })
            .ok_or(LendingError::Overflow)?;
        self.reserve(total)?;
        for (receiver_id, amount) in payouts {
            self.push(receiver_id, *amount);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use near_sdk::test_utils::VMContextBuilder;
    use near_sdk::testing_env;

    /// Records payouts without touching the runtime.
    #[derive(Default)]
    pub struct RecordingCustody {
        pub sent: Vec<(AccountId, NearToken)>,
    }

    impl Custody for RecordingCustody {
        fn send(&mut self, receiver_id: &AccountId, amount: NearToken) -> LendingResult<()> {
            self.sent.push((receiver_id.clone(), amount));
            Ok(())
        }

        fn send_all(&mut self, payouts: &[(AccountId, NearToken)]) -> LendingResult<()> {
            self.sent.extend_from_slice(payouts);
            Ok(())
        }
    }

    /// A custody whose balance is always exhausted.
    pub struct DrainedCustody;

    impl Custody for DrainedCustody {
        fn send(&mut self, _receiver_id: &AccountId, amount: NearToken) -> LendingResult<()> {
            Err(LendingError::InsufficientCustody {
                requested: amount.as_yoctonear(),
                available: 0,
            })
        }

        fn send_all(&mut self, payouts: &[(AccountId, NearToken)]) -> LendingResult<()> {
            let requested: u128 = payouts.iter().map(|(_, amount)| amount.as_yoctonear()).sum();
            Err(LendingError::InsufficientCustody {
                requested,
                available: 0,
            })
        }
    }

    #[test]
    fn skips_zero_payouts() {
        testing_env!(VMContextBuilder::new()
            .account_balance(NearToken::from_near(10))
            .build());
        let mut queue = PayoutQueue::new();
        let alice: AccountId = "alice.near".parse().unwrap();
        queue.send(&alice, NearToken::from_yoctonear(0)).unwrap();
        assert!(queue.payouts().is_empty());
        assert!(queue.dispatch().is_none());
    }

    #[test]
    fn refuses_to_queue_more_than_the_balance() {
        testing_env!(VMContextBuilder::new()
            .account_balance(NearToken::from_near(3))
            .build());
        let mut queue = PayoutQueue::new();
        let alice: AccountId = "alice.near".parse().unwrap();
        queue.send(&alice, NearToken::from_near(2)).unwrap();
        assert_eq!(
            queue.send(&alice, NearToken::from_near(2)),
            Err(LendingError::InsufficientCustody {
                requested: NearToken::from_near(4).as_yoctonear(),
                available: NearToken::from_near(3).as_yoctonear(),
            })
        );
        assert_eq!(
            queue.payouts(),
            &[Payout {
                receiver_id: alice,
                amount: NearToken::from_near(2)
            }]
        );
    }

    #[test]
    fn batches_are_queued_whole_or_not_at_all() {
        testing_env!(VMContextBuilder::new()
            .account_balance(NearToken::from_near(3))
            .build());
        let mut queue = PayoutQueue::new();
        let alice: AccountId = "alice.near".parse().unwrap();
        let bob: AccountId = "bob.near".parse().unwrap();

        assert_eq!(
            queue.send_all(&[
                (alice.clone(), NearToken::from_near(2)),
                (bob.clone(), NearToken::from_near(2)),
            ]),
            Err(LendingError::InsufficientCustody {
                requested: NearToken::from_near(4).as_yoctonear(),
                available: NearToken::from_near(3).as_yoctonear(),
            })
        );
        assert!(queue.payouts().is_empty());

        queue
            .send_all(&[
                (alice.clone(), NearToken::from_near(2)),
                (bob.clone(), NearToken::from_yoctonear(0)),
            ])
            .unwrap();
        assert_eq!(
            queue.payouts(),
            &[Payout {
                receiver_id: alice,
                amount: NearToken::from_near(2)
            }]
        );
    }
}
