//! Lazily-populated channel registry.
//!
//! Maps a device location to its channel object per access mode. Entries
//! are created on first reference and live for the process lifetime;
//! monitor entries are stopped (not removed) on device update/removal.
//!
//! Each map is sharded by a hash of the device location so unrelated
//! devices never contend on one lock; serialization of operations on a
//! single channel is the channel's own concern.

use crate::channel::{GenericChannel, ListenerChannel, TransactionChannel};
use crate::port::PortConfig;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, info};

const SHARD_COUNT: usize = 8;

/// Concurrent location-keyed map with per-shard locking.
struct ShardedMap<T> {
    shards: Vec<Mutex<HashMap<String, Arc<T>>>>,
}

impl<T> ShardedMap<T> {
    fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, key: &str) -> &Mutex<HashMap<String, Arc<T>>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % SHARD_COUNT]
    }

    fn get(&self, key: &str) -> Option<Arc<T>> {
        self.shard(key).lock().get(key).cloned()
    }

    /// Return the existing entry for `key`, or build and register one.
    /// The constructor runs under the shard lock so two concurrent callers
    /// naming the same location cannot create competing entries.
    fn get_or_insert_with(&self, key: &str, build: impl FnOnce() -> T) -> Arc<T> {
        let mut shard = self.shard(key).lock();
        shard
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(build()))
            .clone()
    }

    /// Replace the entry for `key`, returning the previous one if any.
    fn replace(&self, key: &str, value: T) -> (Arc<T>, Option<Arc<T>>) {
        let mut shard = self.shard(key).lock();
        let fresh = Arc::new(value);
        let previous = shard.insert(key.to_string(), Arc::clone(&fresh));
        (fresh, previous)
    }

    fn for_each(&self, mut visit: impl FnMut(&str, &Arc<T>)) {
        for shard in &self.shards {
            for (key, value) in shard.lock().iter() {
                visit(key, value);
            }
        }
    }
}

/// Registry of all channels, one per (mode, device location).
///
/// At most one channel (and thus one open handle) exists per pair at any
/// time; no two channels hold the same physical path within a mode.
pub struct ChannelRegistry {
    generic: ShardedMap<GenericChannel>,
    monitors: ShardedMap<ListenerChannel>,
    transceivers: ShardedMap<TransactionChannel>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            generic: ShardedMap::new(),
            monitors: ShardedMap::new(),
            transceivers: ShardedMap::new(),
        }
    }

    /// Resolve the generic channel for a location, creating (and opening)
    /// it on first reference. A later call with different parameters
    /// returns the existing channel unchanged; use
    /// [`reconfigure_generic`](Self::reconfigure_generic) to apply new
    /// parameters.
    pub fn generic(&self, config: &PortConfig) -> Arc<GenericChannel> {
        self.generic.get_or_insert_with(&config.path, || {
            debug!(device = %config.path, baud = config.baud_rate, "creating generic channel");
            GenericChannel::new(config.clone())
        })
    }

    /// Close the existing channel for this location (if any) and install a
    /// freshly opened one with the given parameters.
    pub fn reconfigure_generic(&self, config: &PortConfig) -> Arc<GenericChannel> {
        let (fresh, previous) = self
            .generic
            .replace(&config.path, GenericChannel::new(config.clone()));
        if let Some(old) = previous {
            info!(device = %config.path, "reconfiguring generic channel");
            old.close();
        }
        fresh
    }

    /// Resolve the listener channel for a location, creating it (without
    /// starting it) on first reference.
    pub fn monitor(&self, path: &str, baud_rate: u32) -> Arc<ListenerChannel> {
        self.monitors.get_or_insert_with(path, || {
            debug!(device = %path, baud = baud_rate, "creating listener channel");
            ListenerChannel::new(path, baud_rate)
        })
    }

    /// Resolve the transaction channel for a location.
    pub fn transceiver(&self, path: &str) -> Arc<TransactionChannel> {
        self.transceivers.get_or_insert_with(path, || {
            debug!(device = %path, "creating transaction channel");
            TransactionChannel::new()
        })
    }

    /// Request stop of the listener for one location, if it is active.
    /// The entry itself stays registered for later restarts.
    pub fn stop_monitor(&self, path: &str) {
        if let Some(listener) = self.monitors.get(path) {
            if listener.is_active() {
                listener.stop();
            }
        }
    }

    /// Stop every active listener and close every generic handle.
    pub fn shutdown(&self) {
        self.monitors.for_each(|path, listener| {
            if listener.is_active() {
                debug!(device = %path, "stopping listener for shutdown");
                listener.stop();
            }
        });
        self.generic.for_each(|_, channel| channel.close());
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // Nonexistent paths: channels are constructed with absent handles,
    // which is all these tests need.
    const DEV_A: &str = "/dev/nonexistent_uart_50001";
    const DEV_B: &str = "/dev/nonexistent_uart_50002";

    fn config(path: &str) -> PortConfig {
        PortConfig::new(path, 9600, Duration::from_secs(1))
    }

    #[test]
    fn resolution_is_lazy_and_stable() {
        let registry = ChannelRegistry::new();
        let a = registry.transceiver(DEV_A);
        let b = registry.transceiver(DEV_A);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn changed_parameters_on_existing_location_are_ignored() {
        let registry = ChannelRegistry::new();
        let first = registry.generic(&config(DEV_A));
        let second = registry.generic(&PortConfig::new(DEV_A, 115_200, Duration::from_secs(5)));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn reconfigure_replaces_the_channel() {
        let registry = ChannelRegistry::new();
        let first = registry.generic(&config(DEV_A));
        let second = registry.reconfigure_generic(&config(DEV_A));
        assert!(!Arc::ptr_eq(&first, &second));
        // The replacement is what later resolution returns.
        let third = registry.generic(&config(DEV_A));
        assert!(Arc::ptr_eq(&second, &third));
    }

    #[test]
    fn distinct_locations_get_distinct_channels() {
        let registry = ChannelRegistry::new();
        let a = registry.monitor(DEV_A, 9600);
        let b = registry.monitor(DEV_B, 9600);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.path(), DEV_A);
        assert_eq!(b.path(), DEV_B);
    }

    #[test]
    fn stop_monitor_on_unknown_location_is_a_no_op() {
        let registry = ChannelRegistry::new();
        registry.stop_monitor(DEV_A);
    }

    #[test]
    fn shutdown_with_idle_entries_is_safe() {
        let registry = ChannelRegistry::new();
        registry.monitor(DEV_A, 9600);
        registry.generic(&config(DEV_B));
        registry.shutdown();
        assert!(!registry.monitor(DEV_A, 9600).is_active());
    }
}
