use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::jid;
use crate::socket::{GroupMetadata, WaSocket};

/// Default roster validity window (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CacheEntry {
    roster: Arc<GroupMetadata>,
    created: Instant,
}

/// Process-wide group roster cache keyed by (bot identity, chat id).
///
/// Entries are replaced wholesale and never mutated, so readers can keep the
/// `Arc` they got after the entry has been swapped out.
pub struct MetadataCache {
    entries: RwLock<HashMap<(String, String), CacheEntry>>,
    ttl: Duration,
}

impl MetadataCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Roster for a group chat, or `None` for direct chats and failed fetches.
    pub async fn get(&self, socket: &dyn WaSocket, chat_id: &str) -> Option<Arc<GroupMetadata>> {
        if !jid::is_group(chat_id) {
            return None;
        }

        let key = (jid::normalize(&socket.user_id()), chat_id.to_string());
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&key) {
                if entry.created.elapsed() < self.ttl {
                    return Some(entry.roster.clone());
                }
            }
        }

        debug!("Fetching group metadata for {}", chat_id);
        match socket.group_metadata(chat_id).await {
            Ok(roster) => {
                let roster = Arc::new(roster);
                self.entries.write().await.insert(
                    key,
                    CacheEntry {
                        roster: roster.clone(),
                        created: Instant::now(),
                    },
                );
                Some(roster)
            }
            Err(e) => {
                warn!("Failed to fetch group metadata for {}: {:#}", chat_id, e);
                None
            }
        }
    }

    /// Drop a chat's roster, e.g. after its membership changed
    pub async fn invalidate(&self, socket: &dyn WaSocket, chat_id: &str) {
        let key = (jid::normalize(&socket.user_id()), chat_id.to_string());
        self.entries.write().await.remove(&key);
    }

    /// Evict entries older than twice the TTL. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let max_age = self.ttl * 2;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.created.elapsed() < max_age);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
