use near_sdk::{near, store::IterableMap};

use crate::error::{LendingError, LendingResult};
use crate::guard::ActionGuard;
use crate::request::{LendingRequest, RequestId};

/// Storage for requests and their action guards, keyed by the same id.
#[near(serializers = [borsh])]
pub struct RequestBook {
    requests: IterableMap<RequestId, LendingRequest>,
    guards: IterableMap<RequestId, ActionGuard>,
    next_id: RequestId,
}

impl RequestBook {
    pub fn new() -> Self {
        Self {
            requests: IterableMap::new(b"r"),
            guards: IterableMap::new(b"g"),
            next_id: 1,
        }
    }

    /// The id the next request will receive.
    pub fn next_id(&self) -> RequestId {
        self.next_id
    }

    /// Stores a freshly built request together with a cleared guard and
    /// consumes its id.
    pub fn open(&mut self, request: LendingRequest) -> RequestId {
        let id = request.id;
        self.requests.insert(id, request);
        self.guards.insert(id, ActionGuard::new());
        self.next_id = id + 1;
        id
    }

    pub fn request(&self, id: RequestId) -> LendingResult<&LendingRequest> {
        self.requests.get(&id).ok_or(LendingError::NotFound {
            kind: "request",
            id,
        })
    }

    pub fn guard(&self, id: RequestId) -> LendingResult<&ActionGuard> {
        self.guards.get(&id).ok_or(LendingError::NotFound {
            kind: "request",
            id,
        })
    }

    /// Working copies of a request and its guard. Nothing is persisted until
    /// they are handed back through [`commit`](Self::commit).
    pub fn load(&self, id: RequestId) -> LendingResult<(LendingRequest, ActionGuard)> {
        Ok((self.request(id)?.clone(), self.guard(id)?.clone()))
    }

    pub fn commit(&mut self, request: LendingRequest, guard: ActionGuard) {
        let id = request.id;
        self.requests.insert(id, request);
        self.guards.insert(id, guard);
    }

    pub fn len(&self) -> u32 {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn page(&self, from_index: u32, limit: u32) -> Vec<&LendingRequest> {
        self.requests
            .values()
            .skip(from_index as usize)
            .take(limit as usize)
            .collect()
    }
}

impl Default for RequestBook {
    fn default() -> Self {
        Self::new()
    }
}
