//! Latest-snapshot store shared between the builder and the query side.
//!
//! The store is a `tokio::sync::watch` channel of `Arc<WorldModel>`. The
//! builder owns the single [`WorldPublisher`]; readers hold cloneable
//! [`WorldStore`] handles. Publishing swaps the whole `Arc`, so a reader
//! sees either the previous snapshot or the new one, never a mix.

use std::sync::Arc;

use tokio::sync::watch;

use crate::world::WorldModel;

/// Write side. Not `Clone`: there is exactly one writer.
#[derive(Debug)]
pub struct WorldPublisher {
    tx: watch::Sender<Arc<WorldModel>>,
}

/// Read side. Cheap to clone; one per connection is fine.
#[derive(Clone, Debug)]
pub struct WorldStore {
    rx: watch::Receiver<Arc<WorldModel>>,
}

/// Create a store holding `initial` as its first snapshot.
pub fn world_store(initial: WorldModel) -> (WorldPublisher, WorldStore) {
    let (tx, rx) = watch::channel(Arc::new(initial));
    (WorldPublisher { tx }, WorldStore { rx })
}

impl WorldPublisher {
    /// Replace the current snapshot.
    ///
    /// Succeeds even when no reader is connected.
    pub fn publish(&self, world: WorldModel) {
        self.tx.send_replace(Arc::new(world));
    }

    /// Snapshot most recently published.
    pub fn current(&self) -> Arc<WorldModel> {
        Arc::clone(&self.tx.borrow())
    }

    /// New read handle onto this store.
    pub fn store(&self) -> WorldStore {
        WorldStore {
            rx: self.tx.subscribe(),
        }
    }
}

impl WorldStore {
    /// Latest published snapshot.
    ///
    /// The internal lock is only held for the `Arc` clone, so readers never
    /// wait on a frame being built.
    pub fn current(&self) -> Arc<WorldModel> {
        Arc::clone(&self.rx.borrow())
    }

    /// Wait for the next publication and return it.
    ///
    /// Returns `None` once the publisher has been dropped.
    pub async fn next_update(&mut self) -> Option<Arc<WorldModel>> {
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&self.rx.borrow_and_update()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_see_latest_publication() {
        let (publisher, store) = world_store(WorldModel::default());
        let reader = store.clone();
        assert_eq!(reader.current().cycle, 0);

        publisher.publish(WorldModel {
            cycle: 7,
            ..WorldModel::default()
        });
        assert_eq!(store.current().cycle, 7);
        assert_eq!(reader.current().cycle, 7);
        assert_eq!(publisher.current().cycle, 7);
    }

    #[test]
    fn held_snapshot_is_not_mutated_by_later_publish() {
        let (publisher, store) = world_store(WorldModel::default());
        let held = store.current();
        publisher.publish(WorldModel {
            cycle: 1,
            ..WorldModel::default()
        });
        assert_eq!(held.cycle, 0);
        assert_eq!(store.current().cycle, 1);
    }

    #[test]
    fn publish_without_readers_still_updates() {
        let (publisher, store) = world_store(WorldModel::default());
        drop(store);
        publisher.publish(WorldModel {
            cycle: 3,
            ..WorldModel::default()
        });
        assert_eq!(publisher.current().cycle, 3);
        assert_eq!(publisher.store().current().cycle, 3);
    }

    #[tokio::test]
    async fn next_update_follows_publisher() {
        let (publisher, mut store) = world_store(WorldModel::default());
        publisher.publish(WorldModel {
            cycle: 1,
            ..WorldModel::default()
        });
        let world = store.next_update().await.expect("update");
        assert_eq!(world.cycle, 1);

        drop(publisher);
        assert!(store.next_update().await.is_none());
    }
}
