use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::store::SessionStore;

/// Spawn the loop that evicts completed sessions once their grace period
/// has passed. Stops when `shutdown_rx` receives a message or its sender
/// is dropped.
pub fn spawn_sweeper(
    store: Arc<dyn SessionStore>,
    interval: Duration,
    grace: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Session sweep loop started");
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Session sweep loop received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let removed = store.sweep(grace, Utc::now());
                    if removed > 0 {
                        debug!(removed, remaining = store.len(), "Expired completed sessions");
                    }
                }
            }
        }
        info!("Session sweep loop stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::Marketplace;
    use crate::session::{InMemorySessionStore, NewSession, SessionEvent};

    #[tokio::test]
    async fn test_sweeper_evicts_after_grace() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let session = store.create(NewSession {
            selected: vec![Marketplace::Shopee],
            parallel: false,
            max_concurrency: 1,
        });
        session.append(SessionEvent::complete()).unwrap();

        let (tx, rx) = broadcast::channel(1);
        let handle = spawn_sweeper(
            Arc::clone(&store),
            Duration::from_millis(10),
            Duration::from_millis(20),
            rx,
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.get(session.id()).is_none());

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
