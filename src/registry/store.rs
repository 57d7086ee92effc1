//! Client registry implementation
//!
//! The membership set shared by the broadcaster and every connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use super::client::{ClientHandle, ClientId};

/// A registered client as captured by [`ClientRegistry::snapshot`]
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: ClientId,
    pub handle: ClientHandle,
}

/// Registry of connected subscribers
///
/// Every method takes the lock for one short critical section. Fan-out works
/// on the copy returned by [`snapshot`](Self::snapshot), so sends never run
/// under the lock and a slow client cannot hold up connects or disconnects.
pub struct ClientRegistry {
    /// Map of client ID to handle
    clients: RwLock<HashMap<ClientId, ClientHandle>>,

    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a client and return its id
    ///
    /// Registering a handle for a connection that is already present returns
    /// the id it was given the first time.
    pub async fn register(&self, handle: ClientHandle) -> ClientId {
        let mut clients = self.clients.write().await;

        if let Some((id, _)) = clients.iter().find(|(_, h)| h.same_connection(&handle)) {
            return *id;
        }

        let id = ClientId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let peer = handle.peer_addr();
        clients.insert(id, handle);

        tracing::info!(
            client_id = %id,
            peer = %peer,
            clients = clients.len(),
            "Client registered"
        );

        id
    }

    /// Remove a client. Returns `false` if it was not registered.
    pub async fn unregister(&self, id: ClientId) -> bool {
        let mut clients = self.clients.write().await;

        match clients.remove(&id) {
            Some(handle) => {
                tracing::info!(
                    client_id = %id,
                    peer = %handle.peer_addr(),
                    connected_secs = handle.connected_for().as_secs(),
                    clients = clients.len(),
                    "Client unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Remove several clients in one critical section
    ///
    /// Returns how many were actually present.
    pub async fn unregister_many(&self, ids: &[ClientId]) -> usize {
        if ids.is_empty() {
            return 0;
        }

        let mut clients = self.clients.write().await;
        let removed = ids.iter().filter(|id| clients.remove(id).is_some()).count();

        if removed > 0 {
            tracing::info!(
                removed = removed,
                clients = clients.len(),
                "Clients removed"
            );
        }

        removed
    }

    /// Point-in-time copy of the current members
    pub async fn snapshot(&self) -> Vec<Subscriber> {
        self.clients
            .read()
            .await
            .iter()
            .map(|(id, handle)| Subscriber {
                id: *id,
                handle: handle.clone(),
            })
            .collect()
    }

    /// Whether `id` is currently registered
    pub async fn contains(&self, id: ClientId) -> bool {
        self.clients.read().await.contains_key(&id)
    }

    /// Number of registered clients
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    /// Drop every member, closing their payload queues
    ///
    /// Returns how many clients were removed.
    pub async fn clear(&self) -> usize {
        let mut clients = self.clients.write().await;
        let count = clients.len();
        clients.clear();
        count
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;

    fn handle() -> (ClientHandle, mpsc::Receiver<bytes::Bytes>) {
        let addr: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        ClientHandle::channel(addr, 1)
    }

    #[tokio::test]
    async fn test_register_assigns_fresh_ids() {
        let registry = ClientRegistry::new();
        let (a, _rx_a) = handle();
        let (b, _rx_b) = handle();

        let id_a = registry.register(a).await;
        let id_b = registry.register(b).await;

        assert_ne!(id_a, id_b);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let registry = ClientRegistry::new();
        let (a, _rx) = handle();

        let first = registry.register(a.clone()).await;
        let second = registry.register(a).await;

        assert_eq!(first, second);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_absent_is_noop() {
        let registry = ClientRegistry::new();
        let (a, _rx) = handle();
        let id = registry.register(a).await;

        assert!(registry.unregister(id).await);
        assert!(!registry.unregister(id).await);
        assert!(!registry.unregister(ClientId::new(999)).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_is_isolated_from_later_changes() {
        let registry = ClientRegistry::new();
        let (a, _rx_a) = handle();
        let (b, _rx_b) = handle();
        let id_a = registry.register(a).await;

        let snapshot = registry.snapshot().await;
        registry.register(b).await;
        registry.unregister(id_a).await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, id_a);
        assert_eq!(registry.len().await, 1);
        assert!(!registry.contains(id_a).await);
    }

    #[tokio::test]
    async fn test_unregister_many() {
        let registry = ClientRegistry::new();
        let mut receivers = Vec::new();
        let mut ids = Vec::new();
        for _ in 0..4 {
            let (h, rx) = handle();
            receivers.push(rx);
            ids.push(registry.register(h).await);
        }

        let removed = registry
            .unregister_many(&[ids[0], ids[2], ClientId::new(1000)])
            .await;

        assert_eq!(removed, 2);
        assert_eq!(registry.len().await, 2);
        assert_eq!(registry.unregister_many(&[]).await, 0);
    }

    #[tokio::test]
    async fn test_clear_closes_queues() {
        let registry = ClientRegistry::new();
        let (a, mut rx) = handle();
        registry.register(a).await;

        assert_eq!(registry.clear().await, 1);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_unregister() {
        let registry = Arc::new(ClientRegistry::new());

        let mut tasks = Vec::new();
        for _ in 0..64 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let (h, rx) = handle();
                (registry.register(h).await, rx)
            }));
        }

        let mut registered = Vec::new();
        for task in tasks {
            registered.push(task.await.unwrap());
        }

        // Remove 24 of them concurrently, each twice, plus some unknown ids
        let mut tasks = Vec::new();
        for (id, _) in registered.iter().take(24) {
            for _ in 0..2 {
                let registry = Arc::clone(&registry);
                let id = *id;
                tasks.push(tokio::spawn(async move { registry.unregister(id).await }));
            }
        }
        for n in 0..8 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry.unregister(ClientId::new(10_000 + n)).await
            }));
        }

        let mut removed = 0;
        for task in tasks {
            if task.await.unwrap() {
                removed += 1;
            }
        }

        assert_eq!(removed, 24);
        assert_eq!(registry.len().await, 64 - 24);
    }
}
