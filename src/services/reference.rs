use crate::payments::types::PaymentMethodKind;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues `{prefix}_{channel}_{nanos}` reference IDs.
///
/// The numeric token is the wall clock in nanoseconds, bumped past the last
/// issued value when two calls land on the same tick, so IDs never repeat
/// within a process.
#[derive(Debug, Default)]
pub struct ReferenceIdGenerator {
    last: AtomicU64,
}

impl ReferenceIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_token(&self) -> u64 {
        let now = chrono::Utc::now()
            .timestamp_nanos_opt()
            .map(|n| n.max(0) as u64)
            .unwrap_or(0);

        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(current) => last = current,
            }
        }
    }

    pub fn generate(&self, method: PaymentMethodKind, channel: &str) -> String {
        format!(
            "{}_{}_{}",
            method.reference_prefix(),
            channel,
            self.next_token()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn reference_has_prefix_channel_and_token() {
        let generator = ReferenceIdGenerator::new();
        let id = generator.generate(PaymentMethodKind::VirtualAccount, "BCA");
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts[0], "va");
        assert_eq!(parts[1], "BCA");
        assert!(parts[2].parse::<u64>().is_ok());
    }

    #[test]
    fn references_are_unique_across_threads() {
        let generator = Arc::new(ReferenceIdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || {
                    (0..500)
                        .map(|_| generator.generate(PaymentMethodKind::Qris, "QRIS"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate reference id");
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
