//! The match engine: atomic find-or-enqueue, wildcard promotion, interest
//! intersection, and session minting.

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::error::AppError;
use crate::model::{MatchedNotification, Outcome, WILDCARD_TAG};
use crate::notification_bus::NotificationBus;
use crate::selector::Selector;
use crate::session_manager::SessionManager;
use crate::store::QueueStore;
use crate::util::{
    POPULAR_PREFIX, all_interests_key, chat_id, interest_key, normalize_interests, popular_key, user_interests_key,
    wildcard_key,
};

pub struct MatchEngine<S: QueueStore, B: NotificationBus> {
    store: Arc<S>,
    bus: Arc<B>,
    sessions: Arc<SessionManager<S>>,
    selector: Arc<Selector>,
    popularity_denylist: HashSet<String>,
}

impl<S: QueueStore, B: NotificationBus> MatchEngine<S, B> {
    pub fn new(
        store: Arc<S>,
        bus: Arc<B>,
        sessions: Arc<SessionManager<S>>,
        selector: Arc<Selector>,
        popularity_denylist: HashSet<String>,
    ) -> Self {
        Self { store, bus, sessions, selector, popularity_denylist }
    }

    /// Find a compatible waiting partner for `user_id`, or enqueue them. A
    /// fresh call first withdraws any earlier search by the same user: a new
    /// search supersedes the previous one rather than stacking.
    pub async fn find_or_queue(&self, user_id: &str, raw_interests: Vec<String>) -> Result<Outcome, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::InvalidInput("userId must not be empty".to_string()));
        }
        let interests = normalize_interests(&raw_interests);

        self.sessions.end(user_id).await?;
        self.withdraw(user_id).await?;

        if !interests.is_empty() {
            // Record popularity unconditionally before attempting a match:
            // every enrollment counts, whether or not the caller ends up
            // paired immediately.
            self.record_popularity(user_id, &interests).await?;

            // Interest-bearing caller: try the caller's own tags, then fall
            // back to anyone waiting on the wildcard queue.
            if let Some(outcome) = self.scan_interest_tags(user_id, &interests).await? {
                return Ok(outcome);
            }
            if let Some(outcome) = self.scan_wildcard(user_id, &interests).await? {
                return Ok(outcome);
            }
        } else {
            // Wildcard caller: try the wildcard queue first, then absorb any
            // interest-bearing waiter by scanning every known tag.
            if let Some(outcome) = self.scan_wildcard(user_id, &interests).await? {
                return Ok(outcome);
            }
            if let Some(outcome) = self.scan_any_interest(user_id).await? {
                return Ok(outcome);
            }
        }

        self.enqueue(user_id, &interests).await?;
        Ok(Outcome::Waiting)
    }

    /// Scan each of the caller's interest tags, in random order, for a
    /// waiting candidate. Returns `Ok(None)` if nobody is currently waiting
    /// under any of them.
    async fn scan_interest_tags(&self, user_id: &str, interests: &[String]) -> Result<Option<Outcome>, AppError> {
        let mut tags: Vec<&String> = interests.iter().collect();
        tags.shuffle(&mut rand::rng());

        for tag in tags {
            loop {
                let Some(candidate) = self.store.pop_random_member(&interest_key(tag)).await? else {
                    break;
                };
                if candidate == user_id {
                    // Left over from a crashed withdraw; put back and move on
                    // without repositioning relative to other waiters.
                    self.store.add_member(&interest_key(tag), &candidate).await?;
                    break;
                }
                let candidate_interests = self.store.members(&user_interests_key(&candidate)).await?;
                let common = common_interests(interests, &candidate_interests);
                if common.is_empty() {
                    // The candidate's own `user_interests` record disagrees with
                    // why they were in this queue (race with a concurrent
                    // cancel/match elsewhere): reinsert and move on to the
                    // next tag.
                    self.store.add_member(&interest_key(tag), &candidate).await?;
                    break;
                }
                let outcome = self.form_pair(user_id, &candidate, &common).await?;
                return Ok(Some(outcome));
            }
        }
        Ok(None)
    }

    /// Fall back to the wildcard queue: anyone waiting there will match
    /// with any caller, interest-bearing or not.
    async fn scan_wildcard(&self, user_id: &str, interests: &[String]) -> Result<Option<Outcome>, AppError> {
        loop {
            let Some(candidate) = self.store.pop_random_member(&wildcard_key()).await? else {
                return Ok(None);
            };
            if candidate == user_id {
                self.store.add_member(&wildcard_key(), &candidate).await?;
                return Ok(None);
            }
            let outcome = self.form_pair(user_id, &candidate, interests).await?;
            return Ok(Some(outcome));
        }
    }

    /// A wildcard caller with nobody waiting on the wildcard queue still
    /// absorbs any interest-bearing waiter: scan every tag ever observed
    /// (order unspecified) for a candidate, pairing on the first hit with
    /// that single tag as the common interest.
    async fn scan_any_interest(&self, user_id: &str) -> Result<Option<Outcome>, AppError> {
        let tags = self.store.members(all_interests_key()).await?;

        for tag in tags {
            if tag == WILDCARD_TAG {
                continue;
            }
            loop {
                let Some(candidate) = self.store.pop_random_member(&interest_key(&tag)).await? else {
                    break;
                };
                if candidate == user_id {
                    self.store.add_member(&interest_key(&tag), &candidate).await?;
                    break;
                }
                let outcome = self.form_pair(user_id, &candidate, std::slice::from_ref(&tag)).await?;
                return Ok(Some(outcome));
            }
        }
        Ok(None)
    }

    /// Persist the session, remove the candidate from every queue they were
    /// waiting in, and notify them. Returns the `Outcome` for the caller.
    async fn form_pair(&self, user_id: &str, candidate: &str, common_interests: &[String]) -> Result<Outcome, AppError> {
        self.withdraw(candidate).await?;

        let id = chat_id(user_id, candidate);
        let server_url = self.selector.next().await?;

        self.sessions
            .create(&id, [user_id.to_string(), candidate.to_string()], server_url.clone())
            .await?;

        let notification =
            MatchedNotification::new(user_id.to_string(), common_interests, id.clone(), server_url.clone());
        self.bus.publish(candidate, &notification).await?;

        Ok(Outcome::Matched {
            partner_user_id: candidate.to_string(),
            common_interests: common_interests.to_vec(),
            chat_id: id,
            chat_server_url: server_url,
        })
    }

    /// Record a popularity enrollment event for every tag the caller
    /// searched under, and add each tag to the set of all known interests.
    /// Runs once per call, independent of whether the caller ends up matched
    /// or enqueued. Wildcard callers never reach here: popularity stays
    /// restricted to interest-bearing callers.
    async fn record_popularity(&self, user_id: &str, interests: &[String]) -> Result<(), AppError> {
        for tag in interests {
            self.store.add_member(all_interests_key(), tag).await?;
            if !self.popularity_denylist.contains(tag) {
                let now_ms = now_millis();
                self.store.zadd(&popular_key(tag), now_ms, user_id).await?;
            }
        }
        Ok(())
    }

    /// Enqueue `user_id` under each of their interest tags (or the wildcard
    /// queue if they supplied none), recording membership for cleanup. A
    /// wildcard enrollment is itself tracked as membership in the reserved
    /// `WILDCARD_ANY` tag, so it shows up in `user_interests` and
    /// `all_interests` the same way an ordinary tag does.
    async fn enqueue(&self, user_id: &str, interests: &[String]) -> Result<(), AppError> {
        if interests.is_empty() {
            self.store.add_member(&wildcard_key(), user_id).await?;
            self.store.add_member(&user_interests_key(user_id), WILDCARD_TAG).await?;
            self.store.add_member(all_interests_key(), WILDCARD_TAG).await?;
            return Ok(());
        }

        let keys: Vec<String> = interests.iter().map(|tag| interest_key(tag)).collect();
        self.store.add_member_to_many(&keys, user_id).await?;

        for tag in interests {
            self.store.add_member(&user_interests_key(user_id), tag).await?;
        }
        Ok(())
    }

    /// Remove `user_id` from every queue they might currently be waiting in:
    /// their own recorded interest tags, the wildcard queue, and the
    /// bookkeeping set itself. Safe to call for a user who isn't queued.
    async fn withdraw(&self, user_id: &str) -> Result<(), AppError> {
        let recorded = self.store.members(&user_interests_key(user_id)).await?;
        if !recorded.is_empty() {
            let keys: Vec<String> = recorded.iter().map(|tag| interest_key(tag)).collect();
            self.store.remove_member_from_many(&keys, user_id).await?;
            self.store.delete(&user_interests_key(user_id)).await?;
        }
        self.store.remove_member(&wildcard_key(), user_id).await?;
        Ok(())
    }

    /// Cancel an in-progress search. Does not touch an already-active
    /// session: a cancel only ever affects queue membership.
    pub async fn cancel(&self, user_id: &str) -> Result<(), AppError> {
        self.withdraw(user_id).await
    }

    /// The `limit` most popular interest tags within the trailing popularity
    /// window, excluding the deny-listed and wildcard tags.
    pub async fn popular_interests(&self, limit: usize) -> Result<Vec<(String, u64)>, AppError> {
        let cutoff = now_millis() - crate::model::POPULARITY_WINDOW_MS as f64;
        let tags = self.store.scan_suffixes(POPULAR_PREFIX).await?;

        let mut ranked = Vec::with_capacity(tags.len());
        for tag in tags {
            if tag == WILDCARD_TAG || self.popularity_denylist.contains(&tag) {
                continue;
            }
            let count = self.store.trim_and_count(&popular_key(&tag), cutoff).await?;
            if count > 0 {
                ranked.push((tag, count));
            }
        }

        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        Ok(ranked)
    }
}

fn common_interests(caller: &[String], candidate: &[String]) -> Vec<String> {
    let candidate_set: HashSet<&String> = candidate.iter().collect();
    caller.iter().filter(|tag| candidate_set.contains(tag)).cloned().collect()
}

fn now_millis() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification_bus::tests_support::MockNotificationBus;
    use crate::store::MockQueueStore;

    fn engine() -> MatchEngine<MockQueueStore, MockNotificationBus> {
        let store = Arc::new(MockQueueStore::new());
        let bus = Arc::new(MockNotificationBus::new());
        let sessions = Arc::new(SessionManager::new(store.clone()));
        let selector = Arc::new(Selector::new(reqwest::Client::new(), String::new()));
        MatchEngine::new(store, bus, sessions, selector, HashSet::new())
    }

    #[tokio::test]
    async fn two_users_with_shared_interest_match_immediately() {
        let engine = engine();
        let first = engine.find_or_queue("alice", vec!["music".to_string()]).await.unwrap();
        assert_eq!(first, Outcome::Waiting);

        let second = engine.find_or_queue("bob", vec!["MUSIC".to_string(), "film".to_string()]).await.unwrap();
        match second {
            Outcome::Matched { partner_user_id, common_interests, .. } => {
                assert_eq!(partner_user_id, "alice");
                assert_eq!(common_interests, vec!["MUSIC".to_string()]);
            }
            Outcome::Waiting => panic!("expected a match"),
        }
    }

    #[tokio::test]
    async fn wildcard_waiter_matches_any_caller() {
        let engine = engine();
        let first = engine.find_or_queue("alice", vec![]).await.unwrap();
        assert_eq!(first, Outcome::Waiting);

        let second = engine.find_or_queue("bob", vec!["MUSIC".to_string()]).await.unwrap();
        match second {
            Outcome::Matched { partner_user_id, .. } => assert_eq!(partner_user_id, "alice"),
            Outcome::Waiting => panic!("expected a match via wildcard"),
        }
    }

    #[tokio::test]
    async fn wildcard_waiter_is_recorded_in_user_interests_and_all_interests() {
        let store = Arc::new(MockQueueStore::new());
        let bus = Arc::new(MockNotificationBus::new());
        let sessions = Arc::new(SessionManager::new(store.clone()));
        let selector = Arc::new(Selector::new(reqwest::Client::new(), String::new()));
        let engine = MatchEngine::new(store.clone(), bus, sessions, selector, HashSet::new());

        let outcome = engine.find_or_queue("alice", vec![]).await.unwrap();
        assert_eq!(outcome, Outcome::Waiting);

        assert_eq!(
            store.members(&user_interests_key("alice")).await.unwrap(),
            vec![WILDCARD_TAG.to_string()],
        );
        assert!(store.members(all_interests_key()).await.unwrap().contains(&WILDCARD_TAG.to_string()));
    }

    #[tokio::test]
    async fn wildcard_caller_absorbs_an_interest_bearing_waiter() {
        let engine = engine();
        let first = engine.find_or_queue("alice", vec!["gaming".to_string()]).await.unwrap();
        assert_eq!(first, Outcome::Waiting);

        // bob has no interests at all; nobody is on the wildcard queue, so
        // he should fall through to scanning `all_interests` and find alice.
        let second = engine.find_or_queue("bob", vec![]).await.unwrap();
        match second {
            Outcome::Matched { partner_user_id, common_interests, .. } => {
                assert_eq!(partner_user_id, "alice");
                assert_eq!(common_interests, vec!["GAMING".to_string()]);
            }
            Outcome::Waiting => panic!("expected bob to absorb alice via all_interests scan"),
        }
    }

    #[tokio::test]
    async fn re_searching_supersedes_the_previous_search() {
        let engine = engine();
        engine.find_or_queue("alice", vec!["music".to_string()]).await.unwrap();
        engine.find_or_queue("alice", vec!["film".to_string()]).await.unwrap();

        // bob only shares MUSIC with alice's *first* search, which should have
        // been withdrawn, so bob should end up waiting, not matched.
        let outcome = engine.find_or_queue("bob", vec!["music".to_string()]).await.unwrap();
        assert_eq!(outcome, Outcome::Waiting);

        // carol shares FILM with alice's current search, so she matches.
        let outcome = engine.find_or_queue("carol", vec!["film".to_string()]).await.unwrap();
        assert!(matches!(outcome, Outcome::Matched { ref partner_user_id, .. } if partner_user_id == "alice"));
    }

    #[tokio::test]
    async fn re_searching_ends_an_active_session() {
        let engine = engine();
        engine.find_or_queue("alice", vec!["music".to_string()]).await.unwrap();
        let matched = engine.find_or_queue("bob", vec!["music".to_string()]).await.unwrap();
        let chat_id = match matched {
            Outcome::Matched { chat_id, .. } => chat_id,
            Outcome::Waiting => panic!("expected a match"),
        };

        assert!(engine.sessions.get_session_for_user("alice").await.is_ok());
        assert!(engine.sessions.get_session_for_user("bob").await.is_ok());

        // alice searches again; her session with bob must be torn down first.
        engine.find_or_queue("alice", vec!["film".to_string()]).await.unwrap();

        assert!(matches!(engine.sessions.get_session_for_user("bob").await, Err(AppError::NotFound(_))));
        assert!(matches!(engine.sessions.get_session_for_user("alice").await, Err(AppError::NotFound(_))));
        let _ = chat_id;
    }

    #[tokio::test]
    async fn inconsistent_candidate_is_reinserted_and_scan_continues() {
        let store = Arc::new(MockQueueStore::new());
        // Simulate a waiter whose `user_interests` record already vanished
        // (e.g. a concurrent cancel) while it is still physically present
        // in the `interest:MUSIC` queue.
        store.add_member(&interest_key("MUSIC"), "ghost").await.unwrap();

        let bus = Arc::new(crate::notification_bus::tests_support::MockNotificationBus::new());
        let sessions = Arc::new(SessionManager::new(store.clone()));
        let selector = Arc::new(Selector::new(reqwest::Client::new(), String::new()));
        let engine = MatchEngine::new(store.clone(), bus, sessions, selector, HashSet::new());

        let outcome = engine.find_or_queue("alice", vec!["music".to_string()]).await.unwrap();
        assert_eq!(outcome, Outcome::Waiting);

        // The ghost candidate was reinserted rather than matched against.
        assert!(store.members(&interest_key("MUSIC")).await.unwrap().contains(&"ghost".to_string()));
    }

    #[tokio::test]
    async fn cancel_removes_a_waiting_user_from_all_queues() {
        let engine = engine();
        engine.find_or_queue("alice", vec!["music".to_string(), "film".to_string()]).await.unwrap();
        engine.cancel("alice").await.unwrap();

        let outcome = engine.find_or_queue("bob", vec!["music".to_string()]).await.unwrap();
        assert_eq!(outcome, Outcome::Waiting);
    }

    #[tokio::test]
    async fn popular_interests_ranks_by_recent_enqueue_count() {
        let engine = engine();
        engine.find_or_queue("alice", vec!["music".to_string()]).await.unwrap();
        engine.find_or_queue("bob", vec!["music".to_string(), "film".to_string()]).await.unwrap();
        engine.find_or_queue("carol", vec!["film".to_string()]).await.unwrap();

        let popular = engine.popular_interests(10).await.unwrap();
        assert_eq!(popular[0].0, "FILM");
        assert_eq!(popular[0].1, 2);
    }

    #[tokio::test]
    async fn denylisted_interest_is_excluded_from_popularity() {
        let store = Arc::new(MockQueueStore::new());
        let bus = Arc::new(MockNotificationBus::new());
        let sessions = Arc::new(SessionManager::new(store.clone()));
        let selector = Arc::new(Selector::new(reqwest::Client::new(), String::new()));
        let mut denylist = HashSet::new();
        denylist.insert("SPAM".to_string());
        let engine = MatchEngine::new(store, bus, sessions, selector, denylist);

        engine.find_or_queue("alice", vec!["spam".to_string()]).await.unwrap();
        let popular = engine.popular_interests(10).await.unwrap();
        assert!(popular.is_empty());
    }
}
