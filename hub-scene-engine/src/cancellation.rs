//! Cooperative cancellation registry for in-flight executions — spec.md
//! §4.5 `StopScene`: cancellation is only observed "between steps", never
//! forced mid-SOAP-call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct CancellationRegistry {
    flags: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

pub struct CancellationGuard {
    registry: Arc<CancellationRegistry>,
    execution_id: String,
    flag: Arc<AtomicBool>,
}

impl CancellationGuard {
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl Drop for CancellationGuard {
    fn drop(&mut self) {
        self.registry.flags.lock().unwrap().remove(&self.execution_id);
    }
}

impl CancellationRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(self: &Arc<Self>, execution_id: &str) -> CancellationGuard {
        let flag = Arc::new(AtomicBool::new(false));
        self.flags.lock().unwrap().insert(execution_id.to_string(), flag.clone());
        CancellationGuard {
            registry: self.clone(),
            execution_id: execution_id.to_string(),
            flag,
        }
    }

    /// Signals cancellation for every currently registered execution id in
    /// `execution_ids`; ids not found (already finished) are ignored.
    pub fn cancel_all(&self, execution_ids: &[String]) {
        let flags = self.flags.lock().unwrap();
        for id in execution_ids {
            if let Some(flag) = flags.get(id) {
                flag.store(true, Ordering::Release);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_all_sets_flag_for_registered_execution() {
        let registry = CancellationRegistry::new();
        let guard = registry.register("e1");
        assert!(!guard.is_canceled());
        registry.cancel_all(&["e1".to_string()]);
        assert!(guard.is_canceled());
    }

    #[test]
    fn guard_removes_itself_on_drop() {
        let registry = CancellationRegistry::new();
        {
            let _guard = registry.register("e1");
            assert_eq!(registry.flags.lock().unwrap().len(), 1);
        }
        assert_eq!(registry.flags.lock().unwrap().len(), 0);
    }
}
