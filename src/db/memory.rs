use super::LinkRepository;
use crate::error::{AppError, AppResult};
use crate::models::{AccessLog, NewLink, ShortenedLink, Stats, Visit};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

struct StoredLink {
    row_id: i64,
    link: ShortenedLink,
    visits: Vec<AccessLog>,
}

/// Process-local link repository.
///
/// Data lives only as long as the process. Used by `STORAGE_BACKEND=memory`
/// and by the HTTP tests.
#[derive(Default)]
pub struct MemoryRepository {
    links: DashMap<String, StoredLink>,
    next_id: AtomicI64,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_row_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl LinkRepository for MemoryRepository {
    async fn create(&self, new_link: NewLink) -> AppResult<ShortenedLink> {
        match self.links.entry(new_link.short_code.clone()) {
            Entry::Occupied(_) => Err(AppError::ShortCodeExists(new_link.short_code)),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let link = ShortenedLink {
                    id: Uuid::new_v4(),
                    original_url: new_link.original_url,
                    short_code: new_link.short_code,
                    short_url: new_link.short_url,
                    method: new_link.method,
                    expiration: new_link.expiration,
                    redirect_count: 0,
                    last_accessed: now,
                    last_modified: now,
                    utm: new_link.utm,
                };
                slot.insert(StoredLink {
                    row_id: self.next_row_id(),
                    link: link.clone(),
                    visits: Vec::new(),
                });
                Ok(link)
            }
        }
    }

    async fn find_by_short_code(&self, short_code: &str) -> AppResult<Option<ShortenedLink>> {
        Ok(self.links.get(short_code).map(|stored| stored.link.clone()))
    }

    async fn find_by_query(&self, query: &str) -> AppResult<Option<ShortenedLink>> {
        if let Some(stored) = self.links.get(query) {
            return Ok(Some(stored.link.clone()));
        }

        Ok(self
            .links
            .iter()
            .find(|stored| stored.link.short_url == query)
            .map(|stored| stored.link.clone()))
    }

    async fn short_code_exists(&self, short_code: &str) -> AppResult<bool> {
        Ok(self.links.contains_key(short_code))
    }

    async fn record_visit(&self, short_code: &str, visit: Visit) -> AppResult<bool> {
        let Some(mut stored) = self.links.get_mut(short_code) else {
            return Ok(false);
        };

        let now = Utc::now();
        let row_id = stored.row_id;
        stored.link.redirect_count += 1;
        stored.link.last_accessed = now;
        stored.visits.push(AccessLog {
            id: Uuid::new_v4(),
            short_url_id: row_id,
            accessed_at: now,
            user_agent: visit.user_agent,
            ip_address: visit.ip_address,
        });

        Ok(true)
    }

    async fn last_access(&self, short_code: &str) -> AppResult<Option<AccessLog>> {
        Ok(self
            .links
            .get(short_code)
            .and_then(|stored| stored.visits.last().cloned()))
    }

    async fn unique_ips(&self, short_code: &str) -> AppResult<Vec<String>> {
        let Some(stored) = self.links.get(short_code) else {
            return Ok(Vec::new());
        };

        let mut ips: Vec<String> = Vec::new();
        for log in &stored.visits {
            if !ips.contains(&log.ip_address) {
                ips.push(log.ip_address.clone());
            }
        }

        Ok(ips)
    }

    async fn top_user_agents(&self, short_code: &str, limit: i64) -> AppResult<Vec<String>> {
        let Some(stored) = self.links.get(short_code) else {
            return Ok(Vec::new());
        };

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for log in &stored.visits {
            *counts.entry(log.user_agent.as_str()).or_default() += 1;
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        Ok(ranked
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|(agent, _)| agent.to_string())
            .collect())
    }

    async fn delete_expired(&self) -> AppResult<u64> {
        let now = Utc::now();
        let before = self.links.len();
        self.links.retain(|_, stored| !stored.link.is_expired_at(now));
        Ok(before.saturating_sub(self.links.len()) as u64)
    }

    async fn stats(&self) -> AppResult<Stats> {
        let now = Utc::now();
        let mut stats = Stats::default();

        for stored in self.links.iter() {
            stats.total_links += 1;
            stats.total_visits += stored.link.redirect_count;
            if stored.link.is_expired_at(now) {
                stats.expired_links += 1;
            } else {
                stats.active_links += 1;
            }
        }

        Ok(stats)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
