//! Mutual exclusion between firmware operations and background monitoring
//!
//! The sensor poller and the update path share the same buses. While a
//! component is being read or written, polling of its monitor domain must
//! stay off. [`MonitorGate`] owns the outbound toggle and hands out
//! [`MonitorSuspension`] guards: the first guard for a domain records the
//! current setting and turns monitoring off, the last guard to drop puts the
//! recorded setting back.

use bic_hal::{MonitorControl, MonitorDomain};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
struct Suspended {
    depth: usize,
    restore_to: bool,
}

pub struct MonitorGate {
    control: Arc<dyn MonitorControl>,
    suspended: Mutex<HashMap<MonitorDomain, Suspended>>,
}

impl fmt::Debug for MonitorGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorGate")
            .field("suspended", &*self.suspended.lock())
            .finish_non_exhaustive()
    }
}

impl MonitorGate {
    pub fn new(control: Arc<dyn MonitorControl>) -> Self {
        Self {
            control,
            suspended: Mutex::new(HashMap::new()),
        }
    }

    /// Turn monitoring of `domain` off until the returned guard drops.
    pub fn suspend(&self, domain: MonitorDomain) -> MonitorSuspension<'_> {
        let mut suspended = self.suspended.lock();
        match suspended.get_mut(&domain) {
            Some(entry) => {
                entry.depth = entry.depth.saturating_add(1);
                debug!(%domain, depth = entry.depth, "Monitoring suspension nested");
            }
            None => {
                let restore_to = self.control.monitoring_enabled(domain);
                self.control.set_monitoring(domain, false);
                suspended.insert(
                    domain,
                    Suspended {
                        depth: 1,
                        restore_to,
                    },
                );
                info!(%domain, was_enabled = restore_to, "Monitoring suspended");
            }
        }
        MonitorSuspension { gate: self, domain }
    }

    pub fn is_suspended(&self, domain: MonitorDomain) -> bool {
        self.suspended.lock().contains_key(&domain)
    }

    pub fn depth(&self, domain: MonitorDomain) -> usize {
        self.suspended
            .lock()
            .get(&domain)
            .map_or(0, |entry| entry.depth)
    }

    fn release(&self, domain: MonitorDomain) {
        let mut suspended = self.suspended.lock();
        let Some(entry) = suspended.get_mut(&domain) else {
            return;
        };
        entry.depth = entry.depth.saturating_sub(1);
        if entry.depth == 0 {
            let restore_to = entry.restore_to;
            suspended.remove(&domain);
            self.control.set_monitoring(domain, restore_to);
            info!(%domain, enabled = restore_to, "Monitoring restored");
        }
    }
}

/// Scope guard returned by [`MonitorGate::suspend`].
#[must_use = "monitoring is restored as soon as the suspension is dropped"]
pub struct MonitorSuspension<'a> {
    gate: &'a MonitorGate,
    domain: MonitorDomain,
}

impl MonitorSuspension<'_> {
    pub fn domain(&self) -> MonitorDomain {
        self.domain
    }
}

impl fmt::Debug for MonitorSuspension<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorSuspension")
            .field("domain", &self.domain)
            .finish()
    }
}

impl Drop for MonitorSuspension<'_> {
    fn drop(&mut self) {
        self.gate.release(self.domain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Flag {
        enabled: AtomicBool,
        writes: AtomicUsize,
    }

    impl MonitorControl for Flag {
        fn set_monitoring(&self, _domain: MonitorDomain, enabled: bool) {
            self.enabled.store(enabled, Ordering::SeqCst);
            self.writes.fetch_add(1, Ordering::SeqCst);
        }

        fn monitoring_enabled(&self, _domain: MonitorDomain) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_suspend_and_restore() {
        let flag = Arc::new(Flag::default());
        flag.enabled.store(true, Ordering::SeqCst);
        let gate = MonitorGate::new(flag.clone());

        {
            let _guard = gate.suspend(MonitorDomain::VoltageRegulators);
            assert!(!flag.enabled.load(Ordering::SeqCst));
            assert!(gate.is_suspended(MonitorDomain::VoltageRegulators));
        }

        assert!(flag.enabled.load(Ordering::SeqCst));
        assert!(!gate.is_suspended(MonitorDomain::VoltageRegulators));
    }

    #[test]
    fn test_nested_suspension_restores_once() {
        let flag = Arc::new(Flag::default());
        flag.enabled.store(true, Ordering::SeqCst);
        let gate = MonitorGate::new(flag.clone());

        let outer = gate.suspend(MonitorDomain::Retimers);
        let inner = gate.suspend(MonitorDomain::Retimers);
        assert_eq!(gate.depth(MonitorDomain::Retimers), 2);

        drop(inner);
        assert!(!flag.enabled.load(Ordering::SeqCst));

        drop(outer);
        assert!(flag.enabled.load(Ordering::SeqCst));
        // one disable plus one restore
        assert_eq!(flag.writes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_previously_disabled_stays_disabled() {
        let flag = Arc::new(Flag::default());
        let gate = MonitorGate::new(flag.clone());

        drop(gate.suspend(MonitorDomain::VoltageRegulators));

        assert!(!flag.enabled.load(Ordering::SeqCst));
    }
}
