use std::collections::HashSet;
use std::sync::Mutex;

/// Process-wide, mutex-guarded in-flight state: which projects currently
/// have a deploy running, and which have a cancel pending. Owned by the
/// orchestrator and constructed once; never a module-level singleton.
#[derive(Default)]
pub struct DeployLocks {
    locks: Mutex<HashSet<String>>,
    cancel_requests: Mutex<HashSet<String>>,
}

impl DeployLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the lock was acquired.
    pub fn try_acquire(&self, project_id: &str) -> bool {
        let mut locks = self.locks.lock().unwrap();
        if locks.contains(project_id) {
            false
        } else {
            locks.insert(project_id.to_string());
            true
        }
    }

    pub fn release(&self, project_id: &str) {
        self.locks.lock().unwrap().remove(project_id);
        self.cancel_requests.lock().unwrap().remove(project_id);
    }

    pub fn is_locked(&self, project_id: &str) -> bool {
        self.locks.lock().unwrap().contains(project_id)
    }

    pub fn request_cancel(&self, project_id: &str) {
        self.cancel_requests
            .lock()
            .unwrap()
            .insert(project_id.to_string());
    }

    pub fn is_cancel_requested(&self, project_id: &str) -> bool {
        self.cancel_requests.lock().unwrap().contains(project_id)
    }
}

/// RAII guard releasing a project's lock (and any pending cancel flag) on
/// every exit path, including early returns via `?` and panics.
pub struct LockGuard<'a> {
    locks: &'a DeployLocks,
    project_id: String,
}

impl<'a> LockGuard<'a> {
    pub fn acquire(locks: &'a DeployLocks, project_id: &str) -> Option<Self> {
        if locks.try_acquire(project_id) {
            Some(Self {
                locks,
                project_id: project_id.to_string(),
            })
        } else {
            None
        }
    }
}

impl<'a> Drop for LockGuard<'a> {
    fn drop(&mut self) {
        self.locks.release(&self.project_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_held() {
        let locks = DeployLocks::new();
        let guard = LockGuard::acquire(&locks, "p1");
        assert!(guard.is_some());
        assert!(LockGuard::acquire(&locks, "p1").is_none());
        drop(guard);
        assert!(LockGuard::acquire(&locks, "p1").is_some());
    }

    #[test]
    fn different_projects_do_not_contend() {
        let locks = DeployLocks::new();
        let _g1 = LockGuard::acquire(&locks, "p1").unwrap();
        assert!(LockGuard::acquire(&locks, "p2").is_some());
    }
}
