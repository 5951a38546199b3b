//! The Fanout Hub (spec §4.H): owns the subscriber registry and walks it for
//! every enriched Entry/Alert, handing matching frames to each subscriber's
//! bounded queue. The registry is a `DashMap` keyed by subscriber id,
//! grounded in the same sharded-map pattern `signalhub-parsers`'s detection
//! cache and `signalhub-collect`'s pool registry already use for
//! low-contention concurrent lookup.

use std::sync::Arc;

use dashmap::DashMap;
use signalhub_core::{Alert, Entry};
use tracing::debug;
use uuid::Uuid;

use crate::filter::{CompiledFilter, FilterError, SubscriptionSpec};
use crate::metrics::SUBSCRIBERS_ACTIVE;
use crate::subscriber::Subscriber;
use crate::transport::{PushFrame, Transport};

#[derive(Debug, Clone, Copy)]
pub struct SubscriberStats {
    pub id: Uuid,
    pub dropped: u64,
}

pub struct FanoutHub {
    subscribers: DashMap<Uuid, Subscriber>,
}

impl FanoutHub {
    pub fn new() -> FanoutHub {
        FanoutHub {
            subscribers: DashMap::new(),
        }
    }

    /// Validates and compiles `spec`, registers a new subscriber, and
    /// returns its id. Rejects ambiguous/invalid filters before the
    /// subscriber is ever added to the fanout loop (spec §4.H "filters are
    /// validated at subscription time").
    pub fn subscribe(&self, spec: &SubscriptionSpec, transport: Arc<dyn Transport>) -> Result<Uuid, FilterError> {
        let filter = CompiledFilter::compile(spec)?;
        let id = Uuid::new_v4();
        let subscriber = Subscriber::new(id, filter, transport);
        self.subscribers.insert(id, subscriber);
        SUBSCRIBERS_ACTIVE.with_label_values(&["active"]).inc();
        debug!(subscriber = %id, "subscribed");
        Ok(id)
    }

    /// Removes and closes a subscription (spec §3.5: "destroyed on
    /// connection close").
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        if let Some((_, subscriber)) = self.subscribers.remove(&id) {
            subscriber.close();
            SUBSCRIBERS_ACTIVE.with_label_values(&["active"]).dec();
            true
        } else {
            false
        }
    }

    /// Walks the registry for this Entry, enqueuing it onto every
    /// subscriber whose filter matches. Subscribers that accumulate three
    /// consecutive drops are removed and closed on the spot.
    pub fn publish_entry(&self, entry: &Entry) {
        self.publish(|sub| {
            if sub.filter.matches_entry(entry) {
                Some(PushFrame::Entry(entry.clone()))
            } else {
                None
            }
        });
    }

    pub fn publish_alert(&self, alert: &Alert) {
        self.publish(|sub| {
            if sub.filter.matches_alert(alert) {
                Some(PushFrame::Alert(alert.clone()))
            } else {
                None
            }
        });
    }

    pub fn broadcast_heartbeat(&self) {
        self.publish(|_| Some(PushFrame::Heartbeat));
    }

    fn publish(&self, frame_for: impl Fn(&Subscriber) -> Option<PushFrame>) {
        let mut to_close = Vec::new();
        for entry in self.subscribers.iter() {
            let subscriber = entry.value();
            let Some(frame) = frame_for(subscriber) else { continue };
            if !subscriber.try_enqueue(frame) {
                to_close.push(*entry.key());
            }
        }
        for id in to_close {
            self.unsubscribe(id);
        }
    }

    pub fn stats(&self) -> Vec<SubscriberStats> {
        self.subscribers
            .iter()
            .map(|entry| SubscriberStats {
                id: *entry.key(),
                dropped: entry.value().dropped_count(),
            })
            .collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Graceful-shutdown step (spec §5 step 6): pushes a graceful-close
    /// frame to every subscriber and waits for each to drain before
    /// returning. Each subscriber closes on its own task so one slow
    /// transport can't hold up the others (spec §8 property 7, "fanout
    /// isolation", applied to shutdown the same as to normal delivery).
    pub async fn close_all(&self) {
        let ids: Vec<Uuid> = self.subscribers.iter().map(|entry| *entry.key()).collect();
        let mut closers = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((_, subscriber)) = self.subscribers.remove(&id) {
                SUBSCRIBERS_ACTIVE.with_label_values(&["active"]).dec();
                closers.push(tokio::spawn(subscriber.close_gracefully()));
            }
        }
        for closer in closers {
            let _ = closer.await;
        }
    }
}

impl Default for FanoutHub {
    fn default() -> Self {
        FanoutHub::new()
    }
}
