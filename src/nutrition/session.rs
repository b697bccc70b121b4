use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use time::{Date, Duration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ai::client::CompletionClient;
use crate::meals::repo::MealEntry;
use crate::nutrition::aggregate::{DailyTotals, NutrientTarget};
use crate::nutrition::estimator::{self, AdviceContext, EstimationError};

/// Cache and cooldown state is scoped per user and day; a bare date key
/// would leak advice between users in a multi-session deployment.
pub type SessionKey = (Uuid, Date);

#[derive(Debug, Clone)]
pub struct AdviceCacheEntry {
    pub text: String,
    pub created_at: OffsetDateTime,
    stale: bool,
}

/// Last successful advice per user and day. One slot per key; only
/// successful generations are written.
#[derive(Default)]
pub struct AdviceCache {
    entries: HashMap<SessionKey, AdviceCacheEntry>,
}

impl AdviceCache {
    pub fn get(&self, key: &SessionKey) -> Option<&AdviceCacheEntry> {
        self.entries.get(key)
    }

    pub fn put(&mut self, key: SessionKey, text: String, now: OffsetDateTime) {
        self.entries.insert(
            key,
            AdviceCacheEntry {
                text,
                created_at: now,
                stale: false,
            },
        );
    }

    /// Request regeneration on the next read. The stored text survives so it
    /// can still be shown while a refresh is pending.
    pub fn invalidate(&mut self, key: &SessionKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.stale = true;
        }
    }
}

/// Timed backoff after a failed advice call.
///
/// `Open → Cooling` on failure via [`trip`](Self::trip); back to `Open`
/// lazily once `now` passes `active_until`, or eagerly via
/// [`clear`](Self::clear) on the next success.
#[derive(Debug, Clone, Copy, Default)]
pub struct CooldownGuard {
    active_until: Option<OffsetDateTime>,
}

impl CooldownGuard {
    pub fn is_blocked(&self, now: OffsetDateTime) -> bool {
        self.active_until.is_some_and(|until| now < until)
    }

    pub fn remaining_seconds(&self, now: OffsetDateTime) -> i64 {
        self.active_until
            .map(|until| (until - now).whole_seconds())
            .filter(|s| *s > 0)
            .unwrap_or(0)
    }

    pub fn trip(&mut self, now: OffsetDateTime, duration: Duration) {
        self.active_until = Some(now + duration);
    }

    pub fn clear(&mut self) {
        self.active_until = None;
    }
}

#[derive(Default)]
struct SessionStore {
    cache: AdviceCache,
    cooldowns: HashMap<SessionKey, CooldownGuard>,
}

impl SessionStore {
    fn guard_mut(&mut self, key: SessionKey) -> &mut CooldownGuard {
        self.cooldowns.entry(key).or_default()
    }
}

pub struct AdviceRequest<'a> {
    pub user_id: Uuid,
    pub date: Date,
    pub explicit_refresh: bool,
    pub model: &'a str,
    pub likes: &'a str,
    pub dislikes: &'a str,
    pub preferences: &'a str,
    pub entries: &'a [MealEntry],
    pub targets: NutrientTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdviceSource {
    Cached,
    Fresh,
    Blocked { wait_seconds: i64 },
    Failed { rate_limited: bool, message: String },
}

/// What a single advice request produced. `text` carries the previously
/// cached advice even for blocked and failed outcomes, so callers can keep
/// showing something useful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdviceOutcome {
    pub text: Option<String>,
    pub source: AdviceSource,
}

/// Orchestrates advice generation over the per-session cache and cooldown.
///
/// Owned by the application state and injected per request; nothing here is
/// global. The lock is released around the completion call.
pub struct AdviceEngine {
    sessions: Mutex<SessionStore>,
    cooldown: Duration,
}

impl AdviceEngine {
    pub fn new(cooldown_seconds: u64) -> Self {
        Self {
            sessions: Mutex::new(SessionStore::default()),
            cooldown: Duration::seconds(cooldown_seconds as i64),
        }
    }

    fn store(&self) -> MutexGuard<'_, SessionStore> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record advice that arrived on the combined estimate call. Counts as a
    /// successful generation: the cache is overwritten and the cooldown
    /// cleared.
    pub fn store_fresh(&self, user_id: Uuid, date: Date, text: String, now: OffsetDateTime) {
        let key = (user_id, date);
        let mut store = self.store();
        store.cache.put(key, text, now);
        store.guard_mut(key).clear();
    }

    /// Mark a day's advice for regeneration, e.g. after an entry was deleted.
    pub fn invalidate(&self, user_id: Uuid, date: Date) {
        self.store().cache.invalidate(&(user_id, date));
    }

    pub async fn request_advice(
        &self,
        client: &dyn CompletionClient,
        now: OffsetDateTime,
        request: AdviceRequest<'_>,
    ) -> AdviceOutcome {
        let key = (request.user_id, request.date);

        {
            let mut store = self.store();
            let blocked = {
                let guard = store.guard_mut(key);
                guard
                    .is_blocked(now)
                    .then(|| guard.remaining_seconds(now))
            };
            if let Some(wait_seconds) = blocked {
                debug!(wait_seconds, "advice request during cooldown");
                let text = store.cache.get(&key).map(|e| e.text.clone());
                return AdviceOutcome {
                    text,
                    source: AdviceSource::Blocked { wait_seconds },
                };
            }
            if !request.explicit_refresh {
                if let Some(entry) = store.cache.get(&key) {
                    if !entry.stale {
                        return AdviceOutcome {
                            text: Some(entry.text.clone()),
                            source: AdviceSource::Cached,
                        };
                    }
                }
            }
        }

        let totals = DailyTotals::aggregate(request.entries);
        let context = AdviceContext {
            likes: request.likes,
            dislikes: request.dislikes,
            preferences: request.preferences,
            entries: request.entries,
            totals,
            targets: request.targets,
            slot: None,
        };
        let result = estimator::generate_advice(client, request.model, &context).await;

        let mut store = self.store();
        match result {
            Ok(text) => {
                store.cache.put(key, text.clone(), now);
                store.guard_mut(key).clear();
                AdviceOutcome {
                    text: Some(text),
                    source: AdviceSource::Fresh,
                }
            }
            Err(e) => {
                store.guard_mut(key).trip(now, self.cooldown);
                warn!(error = %e, "advice generation failed, cooling down");
                let rate_limited = matches!(e, EstimationError::RateLimited { .. });
                let message = if rate_limited {
                    format!(
                        "AI request limit reached, try again in {} seconds",
                        self.cooldown.whole_seconds()
                    )
                } else {
                    "could not generate advice right now".to_string()
                };
                let text = store.cache.get(&key).map(|e| e.text.clone());
                AdviceOutcome {
                    text,
                    source: AdviceSource::Failed {
                        rate_limited,
                        message,
                    },
                }
            }
        }
    }
}
