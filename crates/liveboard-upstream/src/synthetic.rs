//! Synthetic event producer for demo mode.
//!
//! Emits `Connected` immediately, then one random like, gift or viewer-count
//! update per tick until cancelled.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use liveboard_core::{NormalizedEvent, User};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::sink::EventSink;

const LIKE_SHARE: f64 = 0.60;
const GIFT_SHARE: f64 = 0.25; // remainder is viewer-count updates

pub struct CatalogGift {
    pub gift_id: i64,
    pub name: &'static str,
    pub image_url: &'static str,
    pub diamond_value: u64,
    /// Draw probability; strictly decreasing down the catalog, sums to 1.0.
    pub weight: f64,
}

pub const GIFT_CATALOG: [CatalogGift; 7] = [
    CatalogGift {
        gift_id: 1,
        name: "Rose",
        image_url: "/gifts/rose.jpg",
        diamond_value: 1,
        weight: 0.30,
    },
    CatalogGift {
        gift_id: 2,
        name: "Star",
        image_url: "/gifts/star.jpg",
        diamond_value: 5,
        weight: 0.25,
    },
    CatalogGift {
        gift_id: 3,
        name: "Heart",
        image_url: "/gifts/heart.jpg",
        diamond_value: 10,
        weight: 0.20,
    },
    CatalogGift {
        gift_id: 4,
        name: "Crown",
        image_url: "/gifts/crown.jpg",
        diamond_value: 50,
        weight: 0.12,
    },
    CatalogGift {
        gift_id: 5,
        name: "Diamond",
        image_url: "/gifts/diamond.jpg",
        diamond_value: 100,
        weight: 0.08,
    },
    CatalogGift {
        gift_id: 6,
        name: "Lion",
        image_url: "/gifts/lion.jpg",
        diamond_value: 500,
        weight: 0.04,
    },
    CatalogGift {
        gift_id: 7,
        name: "Universe",
        image_url: "/gifts/universe.jpg",
        diamond_value: 1000,
        weight: 0.01,
    },
];

/// Shortest emission interval the generator runs at.
pub const MIN_TICK: Duration = Duration::from_millis(1);

/// (unique_id, nickname, avatar)
pub const DEMO_USERS: [(&str, &str, &str); 8] = [
    ("streamer_fan1", "Alexander", "/avatars/young-man.png"),
    ("tiktok_lover", "Maria K.", "/avatars/young-woman.png"),
    ("mega_supporter", "Dmitry", "/avatars/man-glasses.jpg"),
    ("live_queen", "Anna", "/avatars/blonde-woman.png"),
    ("night_owl", "Kirill", "/avatars/man-beard.jpg"),
    ("lucky_star", "Elena", "/avatars/woman-brunette.jpg"),
    ("gift_master", "Maxim", "/avatars/young-man-smile.jpg"),
    ("pink_diamond", "Olga", "/avatars/woman-redhead.jpg"),
];

/// Cumulative-weight lookup: first bucket whose running total exceeds `draw`.
/// Falls back to the first (most common) gift if rounding leaves a gap.
pub fn pick_gift(draw: f64) -> &'static CatalogGift {
    let mut cumulative = 0.0;
    for gift in GIFT_CATALOG.iter() {
        cumulative += gift.weight;
        if draw < cumulative {
            return gift;
        }
    }
    &GIFT_CATALOG[0]
}

pub struct SyntheticGenerator<R = StdRng> {
    handle: String,
    tick: Duration,
    rng: R,
}

impl SyntheticGenerator<StdRng> {
    pub fn new(handle: impl Into<String>, tick: Duration) -> Self {
        Self::with_rng(handle, tick, StdRng::from_entropy())
    }
}

impl<R: Rng + Send + 'static> SyntheticGenerator<R> {
    /// A zero `tick` is raised to [`MIN_TICK`]; tokio intervals reject zero.
    pub fn with_rng(handle: impl Into<String>, tick: Duration, rng: R) -> Self {
        Self {
            handle: handle.into(),
            tick: tick.max(MIN_TICK),
            rng,
        }
    }

    /// Draw the next scheduled event.
    pub fn next_event(&mut self) -> NormalizedEvent {
        let kind: f64 = self.rng.gen();
        let (id, nick, avatar) = DEMO_USERS[self.rng.gen_range(0..DEMO_USERS.len())];
        let user = User::new(id, nick, avatar);

        if kind < LIKE_SHARE {
            NormalizedEvent::Like {
                user,
                like_count: self.rng.gen_range(1..=20),
                total_like_count: 0,
            }
        } else if kind < LIKE_SHARE + GIFT_SHARE {
            let gift = pick_gift(self.rng.gen());
            NormalizedEvent::Gift {
                user,
                gift_id: gift.gift_id,
                gift_name: gift.name.to_string(),
                gift_image_url: gift.image_url.to_string(),
                diamond_value: gift.diamond_value,
                repeat_count: self.rng.gen_range(1..=5),
            }
        } else {
            NormalizedEvent::ViewerCount {
                count: self.rng.gen_range(100..5100),
            }
        }
    }

    /// Emit until `cancel` fires. Never ends on its own.
    pub async fn run(mut self, sink: Arc<dyn EventSink>, cancel: CancellationToken) {
        info!(
            handle = %self.handle,
            tick_ms = self.tick.as_millis() as u64,
            "synthetic session started"
        );
        sink.connected(
            format!("demo_{}", Utc::now().timestamp_millis()),
            Some(self.handle.clone()),
        );

        let mut ticker = interval_at(Instant::now() + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let event = self.next_event();
                    debug!(handle = %self.handle, kind = event.kind(), "synthetic event");
                    sink.emit(event);
                }
            }
        }
        info!(handle = %self.handle, "synthetic session stopped");
    }

    pub fn spawn(self, sink: Arc<dyn EventSink>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(sink, cancel))
    }
}
