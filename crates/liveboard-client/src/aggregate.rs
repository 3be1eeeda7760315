//! Per-subscriber ranking state built from the normalized event stream.
//!
//! One [`Leaderboard`] belongs to one logical client session. It is mutated
//! only through [`Leaderboard::apply`] and thrown away when the user starts a
//! new session; transport reconnects keep it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use liveboard_core::{config::LeaderboardConfig, DonorEntry, LikerEntry, NormalizedEvent, User};
use serde::Serialize;

/// The single most significant recent gift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadingGift {
    pub user: User,
    pub gift_name: String,
    pub gift_image_url: String,
    pub diamond_value: u64,
    pub repeat_count: u64,
    pub observed_at: Instant,
}

impl LeadingGift {
    pub fn spend(&self) -> u64 {
        self.diamond_value.saturating_mul(self.repeat_count)
    }
}

/// Running totals for the whole session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStats {
    pub viewer_count: u64,
    pub like_count: u64,
    pub total_gifts: u64,
    pub total_diamonds: u64,
    pub is_connected: bool,
    pub room_id: Option<String>,
}

/// Leading gift as handed to renderers: instant replaced by age.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadingGiftView {
    pub user: User,
    pub gift_name: String,
    #[serde(rename = "giftPictureUrl")]
    pub gift_image_url: String,
    #[serde(rename = "diamondCount")]
    pub diamond_value: u64,
    pub repeat_count: u64,
    pub spend: u64,
    pub age_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardSnapshot {
    pub top_likers: Vec<LikerEntry>,
    pub top_donors: Vec<DonorEntry>,
    pub leading_gift: Option<LeadingGiftView>,
    pub stats: StreamStats,
    pub last_error: Option<String>,
}

pub struct Leaderboard {
    top_k: usize,
    stale_after: Duration,
    // uniqueId -> slot in the first-seen ordered entry list
    liker_index: HashMap<String, usize>,
    likers: Vec<LikerEntry>,
    donor_index: HashMap<String, usize>,
    donors: Vec<DonorEntry>,
    top_likers: Vec<LikerEntry>,
    top_donors: Vec<DonorEntry>,
    leading_gift: Option<LeadingGift>,
    stats: StreamStats,
    last_error: Option<String>,
}

impl Default for Leaderboard {
    fn default() -> Self {
        Self::new(&LeaderboardConfig::default())
    }
}

impl Leaderboard {
    pub fn new(config: &LeaderboardConfig) -> Self {
        Self {
            top_k: config.top_k,
            stale_after: Duration::from_secs(config.leading_gift_stale_secs),
            liker_index: HashMap::new(),
            likers: Vec::new(),
            donor_index: HashMap::new(),
            donors: Vec::new(),
            top_likers: Vec::new(),
            top_donors: Vec::new(),
            leading_gift: None,
            stats: StreamStats::default(),
            last_error: None,
        }
    }

    pub fn apply(&mut self, event: &NormalizedEvent) {
        self.apply_at(event, Instant::now());
    }

    /// Apply one event as if observed at `now`.
    pub fn apply_at(&mut self, event: &NormalizedEvent, now: Instant) {
        match event {
            NormalizedEvent::Connected { room_id, .. } => {
                self.stats.room_id = Some(room_id.clone());
                self.stats.is_connected = true;
                self.last_error = None;
            }
            NormalizedEvent::Like {
                user, like_count, ..
            } => {
                self.add_likes(user, *like_count);
                self.stats.like_count = self.stats.like_count.saturating_add(*like_count);
            }
            NormalizedEvent::Gift {
                user,
                gift_name,
                gift_image_url,
                diamond_value,
                repeat_count,
                ..
            } => {
                let spend = event.spend();
                self.add_donation(user, spend, *repeat_count);
                self.stats.total_gifts = self.stats.total_gifts.saturating_add(*repeat_count);
                self.stats.total_diamonds = self.stats.total_diamonds.saturating_add(spend);

                let candidate = LeadingGift {
                    user: user.clone(),
                    gift_name: gift_name.clone(),
                    gift_image_url: gift_image_url.clone(),
                    diamond_value: *diamond_value,
                    repeat_count: *repeat_count,
                    observed_at: now,
                };
                self.offer_leading_gift(candidate, now);
            }
            NormalizedEvent::ViewerCount { count } => {
                self.stats.viewer_count = *count;
            }
            NormalizedEvent::Error { message } => {
                self.last_error = Some(message.clone());
            }
            NormalizedEvent::Disconnected { .. } => {
                self.stats.is_connected = false;
            }
        }
    }

    /// Transport-level connectivity, independent of upstream lifecycle events.
    pub fn set_connected(&mut self, connected: bool) {
        self.stats.is_connected = connected;
    }

    pub fn top_likers(&self) -> &[LikerEntry] {
        &self.top_likers
    }

    pub fn top_donors(&self) -> &[DonorEntry] {
        &self.top_donors
    }

    pub fn leading_gift(&self) -> Option<&LeadingGift> {
        self.leading_gift.as_ref()
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn liker(&self, unique_id: &str) -> Option<&LikerEntry> {
        self.liker_index.get(unique_id).map(|&i| &self.likers[i])
    }

    pub fn donor(&self, unique_id: &str) -> Option<&DonorEntry> {
        self.donor_index.get(unique_id).map(|&i| &self.donors[i])
    }

    pub fn snapshot(&self) -> LeaderboardSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> LeaderboardSnapshot {
        LeaderboardSnapshot {
            top_likers: self.top_likers.clone(),
            top_donors: self.top_donors.clone(),
            leading_gift: self.leading_gift.as_ref().map(|g| LeadingGiftView {
                user: g.user.clone(),
                gift_name: g.gift_name.clone(),
                gift_image_url: g.gift_image_url.clone(),
                diamond_value: g.diamond_value,
                repeat_count: g.repeat_count,
                spend: g.spend(),
                age_ms: now.saturating_duration_since(g.observed_at).as_millis() as u64,
            }),
            stats: self.stats.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn add_likes(&mut self, user: &User, likes: u64) {
        match self.liker_index.get(&user.unique_id) {
            Some(&i) => {
                let entry = &mut self.likers[i];
                entry.user = user.clone();
                entry.total_likes = entry.total_likes.saturating_add(likes);
            }
            None => {
                self.liker_index
                    .insert(user.unique_id.clone(), self.likers.len());
                self.likers.push(LikerEntry {
                    user: user.clone(),
                    total_likes: likes,
                });
            }
        }
        self.top_likers = top_k(&self.likers, self.top_k, |e| e.total_likes);
    }

    fn add_donation(&mut self, user: &User, spend: u64, items: u64) {
        match self.donor_index.get(&user.unique_id) {
            Some(&i) => {
                let entry = &mut self.donors[i];
                entry.user = user.clone();
                entry.total_diamonds = entry.total_diamonds.saturating_add(spend);
                entry.gift_count = entry.gift_count.saturating_add(items);
            }
            None => {
                self.donor_index
                    .insert(user.unique_id.clone(), self.donors.len());
                self.donors.push(DonorEntry {
                    user: user.clone(),
                    total_diamonds: spend,
                    gift_count: items,
                });
            }
        }
        self.top_donors = top_k(&self.donors, self.top_k, |e| e.total_diamonds);
    }

    /// Replace on `>=` spend, or unconditionally once the current one is stale.
    fn offer_leading_gift(&mut self, candidate: LeadingGift, now: Instant) {
        let replace = match &self.leading_gift {
            None => true,
            Some(current) => {
                candidate.spend() >= current.spend()
                    || now.saturating_duration_since(current.observed_at) > self.stale_after
            }
        };
        if replace {
            self.leading_gift = Some(candidate);
        }
    }
}

/// Stable descending sort, so equal scores keep first-seen order.
fn top_k<T: Clone>(entries: &[T], k: usize, score: impl Fn(&T) -> u64) -> Vec<T> {
    let mut ranked = entries.to_vec();
    ranked.sort_by(|a, b| score(b).cmp(&score(a)));
    ranked.truncate(k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> User {
        User::new(id, id.to_uppercase(), format!("/{id}.png"))
    }

    fn like(id: &str, n: u64) -> NormalizedEvent {
        NormalizedEvent::Like {
            user: user(id),
            like_count: n,
            total_like_count: 0,
        }
    }

    fn gift(id: &str, diamond_value: u64, repeat_count: u64) -> NormalizedEvent {
        NormalizedEvent::Gift {
            user: user(id),
            gift_id: 1,
            gift_name: format!("gift-{diamond_value}"),
            gift_image_url: String::new(),
            diamond_value,
            repeat_count,
        }
    }

    #[test]
    fn likes_accumulate_per_user() {
        let mut board = Leaderboard::default();
        board.apply(&like("a", 5));
        board.apply(&like("b", 3));
        board.apply(&like("a", 2));

        assert_eq!(board.liker("a").unwrap().total_likes, 7);
        assert_eq!(board.liker("b").unwrap().total_likes, 3);
        assert_eq!(board.stats().like_count, 10);
        let order: Vec<_> = board.top_likers().iter().map(|e| e.user.unique_id.as_str()).collect();
        assert_eq!(order, ["a", "b"]);
    }

    #[test]
    fn totals_saturate_instead_of_overflowing() {
        let mut board = Leaderboard::default();
        board.apply(&like("a", u64::MAX));
        board.apply(&like("a", u64::MAX));
        board.apply(&gift("b", u64::MAX, 2));
        board.apply(&gift("b", 1, u64::MAX));

        assert_eq!(board.liker("a").unwrap().total_likes, u64::MAX);
        assert_eq!(board.stats().like_count, u64::MAX);
        let donor = board.donor("b").unwrap();
        assert_eq!(donor.total_diamonds, u64::MAX);
        assert_eq!(donor.gift_count, u64::MAX);
        assert_eq!(board.stats().total_gifts, u64::MAX);
        assert_eq!(board.stats().total_diamonds, u64::MAX);
    }

    #[test]
    fn latest_profile_wins() {
        let mut board = Leaderboard::default();
        board.apply(&like("a", 1));
        board.apply(&NormalizedEvent::Like {
            user: User::new("a", "Renamed", "/new.png"),
            like_count: 1,
            total_like_count: 0,
        });
        let entry = board.liker("a").unwrap();
        assert_eq!(entry.user.nickname, "Renamed");
        assert_eq!(entry.user.avatar_url, "/new.png");
        assert_eq!(entry.total_likes, 2);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let mut board = Leaderboard::default();
        board.apply(&like("late", 0));
        board.apply(&like("c", 4));
        board.apply(&like("a", 4));
        board.apply(&like("b", 4));
        board.apply(&like("late", 4));

        let order: Vec<_> = board.top_likers().iter().map(|e| e.user.unique_id.as_str()).collect();
        assert_eq!(order, ["late", "c", "a", "b"]);
    }

    #[test]
    fn top_views_are_bounded_sorted_and_deterministic() {
        let events: Vec<_> = (0..40u64)
            .flat_map(|i| {
                let id = format!("u{}", i % 23);
                [like(&id, (i * 7) % 13 + 1), gift(&id, (i * 5) % 11 + 1, i % 3 + 1)]
            })
            .collect();

        let run = || {
            let mut board = Leaderboard::default();
            for ev in &events {
                board.apply(ev);
            }
            (board.top_likers().to_vec(), board.top_donors().to_vec())
        };
        let (likers, donors) = run();

        assert_eq!(likers.len(), 10);
        assert_eq!(donors.len(), 10);
        assert!(likers.windows(2).all(|w| w[0].total_likes >= w[1].total_likes));
        assert!(donors.windows(2).all(|w| w[0].total_diamonds >= w[1].total_diamonds));
        assert_eq!(run(), (likers, donors));
    }

    #[test]
    fn donors_rank_by_spend_and_count_items() {
        // userA: 10 x5 = 50, userB: 100 x1 = 100
        let mut board = Leaderboard::default();
        board.apply(&gift("userA", 10, 5));
        board.apply(&gift("userB", 100, 1));

        let a = board.donor("userA").unwrap();
        assert_eq!(a.total_diamonds, 50);
        assert_eq!(a.gift_count, 5);
        assert_eq!(board.donor("userB").unwrap().total_diamonds, 100);

        let order: Vec<_> = board.top_donors().iter().map(|e| e.user.unique_id.as_str()).collect();
        assert_eq!(order, ["userB", "userA"]);
        let leading = board.leading_gift().unwrap();
        assert_eq!(leading.user.unique_id, "userB");
        assert_eq!(leading.spend(), 100);

        assert_eq!(board.stats().total_gifts, 6);
        assert_eq!(board.stats().total_diamonds, 150);
    }

    #[test]
    fn leading_gift_keeps_max_within_window_and_latest_on_tie() {
        let t0 = Instant::now();
        let mut board = Leaderboard::default();

        board.apply_at(&gift("a", 50, 1), t0);
        board.apply_at(&gift("b", 10, 1), t0 + Duration::from_secs(5));
        assert_eq!(board.leading_gift().unwrap().user.unique_id, "a");

        board.apply_at(&gift("c", 25, 2), t0 + Duration::from_secs(10));
        let leading = board.leading_gift().unwrap();
        assert_eq!(leading.user.unique_id, "c");
        assert_eq!(leading.observed_at, t0 + Duration::from_secs(10));
    }

    #[test]
    fn stale_leading_gift_is_replaced_by_smaller_one() {
        let t0 = Instant::now();
        let mut board = Leaderboard::default();
        board.apply_at(&gift("whale", 1000, 1), t0);

        board.apply_at(&gift("small", 1, 1), t0 + Duration::from_secs(30));
        assert_eq!(board.leading_gift().unwrap().user.unique_id, "whale");

        board.apply_at(&gift("small", 1, 1), t0 + Duration::from_secs(31));
        let leading = board.leading_gift().unwrap();
        assert_eq!(leading.user.unique_id, "small");
        assert_eq!(leading.observed_at, t0 + Duration::from_secs(31));
    }

    #[test]
    fn lifecycle_events_do_not_touch_rankings() {
        let mut board = Leaderboard::default();
        board.apply(&like("a", 3));
        board.apply(&gift("a", 5, 1));
        let before = (board.top_likers().to_vec(), board.top_donors().to_vec());

        board.apply(&NormalizedEvent::Connected {
            room_id: "r2".into(),
            username: None,
        });
        board.apply(&NormalizedEvent::Error {
            message: "User is not live right now".into(),
        });
        board.apply(&NormalizedEvent::ViewerCount { count: 321 });
        board.apply(&NormalizedEvent::Disconnected { message: None });

        assert_eq!((board.top_likers().to_vec(), board.top_donors().to_vec()), before);
        assert_eq!(board.stats().room_id.as_deref(), Some("r2"));
        assert_eq!(board.stats().viewer_count, 321);
        assert!(!board.stats().is_connected);
        assert_eq!(board.last_error(), Some("User is not live right now"));
    }

    #[test]
    fn snapshot_reports_gift_age() {
        let t0 = Instant::now();
        let mut board = Leaderboard::default();
        board.apply_at(&gift("a", 10, 2), t0);

        let snap = board.snapshot_at(t0 + Duration::from_millis(1500));
        let view = snap.leading_gift.unwrap();
        assert_eq!(view.spend, 20);
        assert_eq!(view.age_ms, 1500);

        let json = serde_json::to_value(board.snapshot_at(t0)).unwrap();
        assert_eq!(json["leadingGift"]["diamondCount"], 10);
        assert_eq!(json["stats"]["totalDiamonds"], 20);
    }

    #[test]
    fn custom_top_k_is_respected() {
        let mut board = Leaderboard::new(&LeaderboardConfig {
            top_k: 3,
            leading_gift_stale_secs: 30,
        });
        for i in 0..6 {
            board.apply(&like(&format!("u{i}"), i + 1));
        }
        let order: Vec<_> = board.top_likers().iter().map(|e| e.user.unique_id.as_str()).collect();
        assert_eq!(order, ["u5", "u4", "u3"]);
    }
}
