use std::sync::Arc;

use dashmap::DashMap;

use crate::call::CallId;
use crate::error::RpcServerError;

/// Tracks in-flight calls.
///
/// Each dispatched call registers itself here for its lifetime; the guard
/// returned by [`CallMap::try_create`] removes the entry when dropped, so
/// teardown needs no explicit bookkeeping.
#[derive(Debug)]
pub(crate) struct CallMap {
    calls: DashMap<CallId, String, ahash::RandomState>,
}

impl CallMap {
    pub(crate) fn new() -> Self {
        Self {
            calls: DashMap::default(),
        }
    }

    /// Register a call. Returns a guard that removes the entry on drop.
    pub(crate) fn try_create(
        self: &Arc<Self>,
        call_id: CallId,
        path: &str,
    ) -> Result<CallGuard, RpcServerError> {
        use dashmap::mapref::entry::Entry;

        match self.calls.entry(call_id) {
            Entry::Occupied(_) => Err(RpcServerError::CallAlreadyActive { call_id }),
            Entry::Vacant(slot) => {
                slot.insert(path.to_owned());
                Ok(CallGuard {
                    call_id,
                    map: Arc::clone(self),
                })
            }
        }
    }

    pub(crate) fn contains(&self, call_id: &CallId) -> bool {
        self.calls.contains_key(call_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }

    fn remove(&self, call_id: &CallId) {
        self.calls.remove(call_id);
    }
}

/// Holds one active call's registration. Removing happens on drop.
#[derive(Debug)]
pub(crate) struct CallGuard {
    call_id: CallId,
    map: Arc<CallMap>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.map.remove(&self.call_id);
    }
}
