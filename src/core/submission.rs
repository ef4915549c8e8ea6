use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// 防止同一筆預約被重複送出
#[derive(Debug, Clone, Default)]
pub struct SubmissionGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取得送出許可；相同 key 已在送出中時回傳 None
    pub fn try_acquire(&self, key: impl Into<String>) -> Option<SubmissionTicket> {
        let key = key.into();
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(key.clone()) {
            tracing::warn!("⚠️ submission {} is already in flight", key);
            return None;
        }
        Some(SubmissionTicket {
            key,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .map(|set| set.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

/// 被 drop 時釋放 key
#[derive(Debug)]
pub struct SubmissionTicket {
    key: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl SubmissionTicket {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for SubmissionTicket {
    fn drop(&mut self) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected_until_release() {
        let guard = SubmissionGuard::new();

        let ticket = guard.try_acquire("office-1/host-2/2026-10-20/09:00").unwrap();
        assert!(guard.try_acquire("office-1/host-2/2026-10-20/09:00").is_none());
        assert!(guard.try_acquire("office-1/host-2/2026-10-20/09:30").is_some());
        assert_eq!(guard.in_flight(), 1);

        drop(ticket);
        assert_eq!(guard.in_flight(), 0);
        assert!(guard.try_acquire("office-1/host-2/2026-10-20/09:00").is_some());
    }

    #[test]
    fn test_clones_share_state() {
        let guard = SubmissionGuard::new();
        let other = guard.clone();

        let _ticket = guard.try_acquire("k").unwrap();
        assert!(other.try_acquire("k").is_none());
    }
}
