//! Generator failover: primary → fallback₁ → fallback₂.
//!
//! Generators that keep failing are skipped until a cool-down expires.

use async_trait::async_trait;
use shiftdesk_core::error::{Result, ShiftdeskError};
use shiftdesk_core::traits::TextGenerator;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

const MAX_FAILURES: u32 = 3;
const COOLDOWN_SECS: u64 = 60;

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Per-generator health tracking.
struct GeneratorSlot {
    generator: Box<dyn TextGenerator>,
    /// Consecutive failure count.
    failures: AtomicU32,
    /// Unix secs of the last failure, 0 = never.
    last_failure: AtomicU64,
}

impl GeneratorSlot {
    fn new(generator: Box<dyn TextGenerator>) -> Self {
        Self {
            generator,
            failures: AtomicU32::new(0),
            last_failure: AtomicU64::new(0),
        }
    }

    fn is_healthy_at(&self, now: u64) -> bool {
        if self.failures.load(Ordering::Relaxed) < MAX_FAILURES {
            return true;
        }
        now.saturating_sub(self.last_failure.load(Ordering::Relaxed)) > COOLDOWN_SECS
    }

    fn record_success(&self) {
        self.failures.store(0, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.last_failure.store(unix_now(), Ordering::Relaxed);
    }
}

/// Tries generators in order, skipping unhealthy ones.
pub struct FailoverGenerator {
    slots: Vec<GeneratorSlot>,
}

impl FailoverGenerator {
    /// First generator is primary, the rest are fallbacks.
    pub fn new(generators: Vec<Box<dyn TextGenerator>>) -> Self {
        Self {
            slots: generators.into_iter().map(GeneratorSlot::new).collect(),
        }
    }

    pub fn chain_len(&self) -> usize {
        self.slots.len()
    }

    /// (name, healthy, consecutive failures) per generator.
    pub fn health_status(&self) -> Vec<(&str, bool, u32)> {
        let now = unix_now();
        self.slots
            .iter()
            .map(|s| {
                (
                    s.generator.name(),
                    s.is_healthy_at(now),
                    s.failures.load(Ordering::Relaxed),
                )
            })
            .collect()
    }
}

#[async_trait]
impl TextGenerator for FailoverGenerator {
    fn name(&self) -> &str {
        self.slots
            .first()
            .map(|s| s.generator.name())
            .unwrap_or("failover")
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut last_error = None;
        let now = unix_now();

        for (idx, slot) in self.slots.iter().enumerate() {
            if !slot.is_healthy_at(now) {
                tracing::debug!(
                    "⏭️ Skipping unhealthy generator: {} ({} failures)",
                    slot.generator.name(),
                    slot.failures.load(Ordering::Relaxed)
                );
                continue;
            }

            match slot.generator.generate(prompt).await {
                Ok(text) => {
                    if idx > 0 {
                        tracing::info!(
                            "🔄 Failover: {} → {} (success)",
                            self.name(),
                            slot.generator.name()
                        );
                    }
                    slot.record_success();
                    return Ok(text);
                }
                Err(e) => {
                    slot.record_failure();
                    tracing::warn!(
                        "⚠️ Generator {} failed (attempt {}): {e}",
                        slot.generator.name(),
                        slot.failures.load(Ordering::Relaxed)
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ShiftdeskError::external("all generators unhealthy")))
    }

    async fn health_check(&self) -> Result<bool> {
        let now = unix_now();
        for slot in &self.slots {
            if slot.is_healthy_at(now) && matches!(slot.generator.health_check().await, Ok(true)) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
