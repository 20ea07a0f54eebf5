use crate::device_path;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// Mutual exclusion for one physical device.
///
/// `parted` gives no exclusivity of its own: two table mutations against
/// the same device must never interleave.
#[derive(Debug, Clone, Default)]
pub struct DeviceLock(Arc<Mutex<()>>);

impl DeviceLock {
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        // the guarded value is `()`, a panicking holder cannot leave it torn
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Device-keyed map of [`DeviceLock`]s. `sdb` and `/dev/sdb` share a lock.
#[derive(Debug, Default)]
pub struct DeviceLocks {
    locks: Mutex<HashMap<String, DeviceLock>>,
}

impl DeviceLocks {
    pub fn get(&self, device: &str) -> DeviceLock {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(device_path(device))
            .or_default()
            .clone()
    }
}
