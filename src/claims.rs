use near_sdk::{near, store::IterableMap, AccountId};

use crate::error::{LendingError, LendingResult};
use crate::request::RequestId;

/// Claim tokens share the id of the request they pay out.
pub type ClaimId = RequestId;

/// The capabilities the lending flow and the market need from a claim
/// registry. The registry itself is a plain non-fungible asset store.
pub trait ClaimLedger {
    fn mint(&mut self, owner_id: &AccountId, claim_id: ClaimId) -> LendingResult<()>;
    fn burn(&mut self, claim_id: ClaimId) -> LendingResult<()>;
    fn owner_of(&self, claim_id: ClaimId) -> LendingResult<AccountId>;
    fn approved_operator(&self, claim_id: ClaimId) -> LendingResult<Option<AccountId>>;
    /// Moves `claim_id` from `from` to `to` on behalf of `operator`, which must
    /// hold the current approval.
    fn transfer_with_approval_check(
        &mut self,
        operator: &AccountId,
        from: &AccountId,
        to: &AccountId,
        claim_id: ClaimId,
    ) -> LendingResult<()>;
}

#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimToken {
    pub owner_id: AccountId,
    pub approved_account_id: Option<AccountId>,
}

#[near(serializers = [borsh])]
pub struct ClaimRegistry {
    tokens: IterableMap<ClaimId, ClaimToken>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self {
            tokens: IterableMap::new(b"c"),
        }
    }

    fn token(&self, claim_id: ClaimId) -> LendingResult<&ClaimToken> {
        self.tokens.get(&claim_id).ok_or(LendingError::NotFound {
            kind: "claim",
            id: claim_id,
        })
    }

    fn owned_token_mut(
        &mut self,
        caller: &AccountId,
        claim_id: ClaimId,
    ) -> LendingResult<&mut ClaimToken> {
        let token = self.tokens.get_mut(&claim_id).ok_or(LendingError::NotFound {
            kind: "claim",
            id: claim_id,
        })?;
        if &token.owner_id != caller {
            return Err(LendingError::Unauthorized(caller.clone()));
        }
        Ok(token)
    }

    /// Lets `operator` move the claim once on the owner's behalf.
    pub fn approve(
        &mut self,
        caller: &AccountId,
        claim_id: ClaimId,
        operator: AccountId,
    ) -> LendingResult<()> {
        self.owned_token_mut(caller, claim_id)?.approved_account_id = Some(operator);
        Ok(())
    }

    pub fn revoke(&mut self, caller: &AccountId, claim_id: ClaimId) -> LendingResult<()> {
        self.owned_token_mut(caller, claim_id)?.approved_account_id = None;
        Ok(())
    }

    /// Owner-initiated transfer. Any standing approval is dropped.
    pub fn transfer(
        &mut self,
        caller: &AccountId,
        receiver_id: AccountId,
        claim_id: ClaimId,
    ) -> LendingResult<()> {
        if &receiver_id == caller {
            return Err(LendingError::InvalidArgument(
                "claim receiver is already the owner",
            ));
        }
        let token = self.owned_token_mut(caller, claim_id)?;
        token.owner_id = receiver_id;
        token.approved_account_id = None;
        Ok(())
    }

    pub fn get(&self, claim_id: ClaimId) -> Option<&ClaimToken> {
        self.tokens.get(&claim_id)
    }
}

impl Default for ClaimRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimLedger for ClaimRegistry {
    fn mint(&mut self, owner_id: &AccountId, claim_id: ClaimId) -> LendingResult<()> {
        if self.tokens.contains_key(&claim_id) {
            return Err(LendingError::InvalidState("claim token already minted"));
        }
        self.tokens.insert(
            claim_id,
            ClaimToken {
                owner_id: owner_id.clone(),
                approved_account_id: None,
            },
        );
        Ok(())
    }

    fn burn(&mut self, claim_id: ClaimId) -> LendingResult<()> {
        self.tokens
            .remove(&claim_id)
            .map(|_| ())
            .ok_or(LendingError::NotFound {
                kind: "claim",
                id: claim_id,
            })
    }

    fn owner_of(&self, claim_id: ClaimId) -> LendingResult<AccountId> {
        Ok(self.token(claim_id)?.owner_id.clone())
    }

    fn approved_operator(&self, claim_id: ClaimId) -> LendingResult<Option<AccountId>> {
        Ok(self.token(claim_id)?.approved_account_id.clone())
    }

    fn transfer_with_approval_check(
        &mut self,
        operator: &AccountId,
        from: &AccountId,
        to: &AccountId,
        claim_id: ClaimId,
    ) -> LendingResult<()> {
        let token = self.tokens.get_mut(&claim_id).ok_or(LendingError::NotFound {
            kind: "claim",
            id: claim_id,
        })?;
        if &token.owner_id != from {
            return Err(LendingError::Unauthorized(from.clone()));
        }
        if token.approved_account_id.as_ref() != Some(operator) {
            return Err(LendingError::Unauthorized(operator.clone()));
        }
        token.owner_id = to.clone();
        token.approved_account_id = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use near_sdk::test_utils::VMContextBuilder;
    use near_sdk::testing_env;

    fn account(name: &str) -> AccountId {
        name.parse().unwrap()
    }

    fn registry() -> ClaimRegistry {
        testing_env!(VMContextBuilder::new().build());
        ClaimRegistry::new()
    }

    #[test]
    fn mint_then_burn() {
        let mut claims = registry();
        claims.mint(&account("lender.near"), 7).unwrap();
        assert_eq!(claims.owner_of(7).unwrap(), account("lender.near"));
        assert_eq!(
            claims.mint(&account("other.near"), 7),
            Err(LendingError::InvalidState("claim token already minted"))
        );

        claims.burn(7).unwrap();
        assert_eq!(
            claims.owner_of(7),
            Err(LendingError::NotFound { kind: "claim", id: 7 })
        );
        assert!(claims.burn(7).is_err());
    }

    #[test]
    fn approved_operator_can_move_the_claim_once() {
        let mut claims = registry();
        let lender = account("lender.near");
        let market = account("market.near");
        let buyer = account("buyer.near");
        claims.mint(&lender, 1).unwrap();

        assert_eq!(
            claims.transfer_with_approval_check(&market, &lender, &buyer, 1),
            Err(LendingError::Unauthorized(market.clone()))
        );

        claims.approve(&lender, 1, market.clone()).unwrap();
        assert_eq!(claims.approved_operator(1).unwrap(), Some(market.clone()));
        claims
            .transfer_with_approval_check(&market, &lender, &buyer, 1)
            .unwrap();

        assert_eq!(claims.owner_of(1).unwrap(), buyer);
        assert_eq!(claims.approved_operator(1).unwrap(), None);
        assert_eq!(
            claims.transfer_with_approval_check(&market, &buyer, &lender, 1),
            Err(LendingError::Unauthorized(market))
        );
    }

    #[test]
    fn only_the_owner_approves_or_transfers() {
        let mut claims = registry();
        let (lender, stranger) = (account("lender.near"), account("stranger.near"));
        claims.mint(&lender, 3).unwrap();

        assert_eq!(
            claims.approve(&stranger, 3, stranger.clone()),
            Err(LendingError::Unauthorized(stranger.clone()))
        );
        assert_eq!(
            claims.transfer(&stranger, account("thief.near"), 3),
            Err(LendingError::Unauthorized(stranger.clone()))
        );

        claims.approve(&lender, 3, account("market.near")).unwrap();
        claims.transfer(&lender, stranger.clone(), 3).unwrap();
        let token = claims.get(3).unwrap();
        assert_eq!(token.owner_id, stranger);
        assert_eq!(token.approved_account_id, None);
    }
}
