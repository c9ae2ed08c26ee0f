use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::utils::id::NodeName;

/// Names of the nodes with a run queued or executing. At most one run per
/// node exists at any time.
#[derive(Debug, Clone, Default)]
pub struct InProgressSet {
    names: Arc<Mutex<HashSet<NodeName>>>,
}

impl InProgressSet {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking run only ever drops its guard, so the set stays consistent.
    fn lock(&self) -> MutexGuard<'_, HashSet<NodeName>> {
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims `name`, or returns `None` if it is already claimed. The claim is
    /// released when the guard drops.
    pub fn try_claim(&self, name: &NodeName) -> Option<ClaimGuard> {
        if self.lock().insert(name.clone()) {
            Some(ClaimGuard { set: self.clone(), name: name.clone() })
        } else {
            None
        }
    }

    pub fn contains(&self, name: &NodeName) -> bool {
        self.lock().contains(name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct ClaimGuard {
    set: InProgressSet,
    name: NodeName,
}

impl ClaimGuard {
    pub fn name(&self) -> &NodeName {
        &self.name
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_refused_until_release() {
        let set = InProgressSet::new();
        let name = NodeName::new("r3-n01");

        let guard = set.try_claim(&name).unwrap();
        assert!(set.try_claim(&name).is_none());
        assert_eq!(set.len(), 1);

        drop(guard);
        assert!(set.is_empty());
        assert!(set.try_claim(&name).is_some());
    }

    #[test]
    fn claim_is_released_when_the_owner_panics() {
        let set = InProgressSet::new();
        let name = NodeName::new("r3-n02");

        let cloned = set.clone();
        let owner = name.clone();
        let result = std::thread::spawn(move || {
            let _guard = cloned.try_claim(&owner).unwrap();
            panic!("run blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(!set.contains(&name));
    }
}
