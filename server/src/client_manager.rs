//! Connection tracking for the survey server
//!
//! This module keeps one entry per open TCP connection:
//! - the outbound queue drained by the connection's writer task
//! - the display name once the client has joined
//! - activity timestamps for idle-timeout detection
//!
//! Capacity is enforced here so a full server refuses connections before any
//! game state is touched.

use log::{info, warn};
use shared::Frame;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Represents a connected client
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// Set once the client has sent a join request
    pub name: Option<String>,
    /// Last time we received any frame from this client
    pub last_seen: Instant,
    sender: mpsc::UnboundedSender<Frame>,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, sender: mpsc::UnboundedSender<Frame>) -> Self {
        Self {
            id,
            addr,
            name: None,
            last_seen: Instant::now(),
            sender,
        }
    }

    /// Returns true if nothing was received within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Returns `None` if the server is at capacity
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Frame>,
    ) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));

        Some(client_id)
    }

    /// Returns true if the client was found and removed
    pub fn remove_client(&mut self, client_id: u32) -> bool {
        if let Some(client) = self.clients.remove(&client_id) {
            info!("Client {} ({}) disconnected", client.id, client.addr);
            true
        } else {
            false
        }
    }

    pub fn touch(&mut self, client_id: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    /// Records the display name; returns false if the client already joined
    pub fn set_name(&mut self, client_id: u32, name: &str) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) if client.name.is_none() => {
                client.name = Some(name.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn name(&self, client_id: u32) -> Option<&str> {
        self.clients
            .get(&client_id)
            .and_then(|client| client.name.as_deref())
    }

    /// Queues a frame for the client's writer task
    pub fn send(&self, client_id: u32, frame: Frame) -> bool {
        match self.clients.get(&client_id) {
            Some(client) => {
                if client.sender.send(frame).is_err() {
                    warn!("Writer for client {} is gone", client_id);
                    return false;
                }
                true
            }
            None => false,
        }
    }

    /// Removes and returns clients idle for longer than `timeout`
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            info!("Client {} timed out", client_id);
            self.remove_client(*client_id);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn frame() -> Frame {
        Frame {
            channel: "text".to_string(),
            payload: json!({"message": "hi", "room": null}),
        }
    }

    #[test]
    fn test_add_client_assigns_increasing_ids() {
        let mut manager = ClientManager::new(4);
        let (tx, _rx) = mpsc::unbounded_channel();

        assert_eq!(manager.add_client(test_addr(), tx.clone()), Some(1));
        assert_eq!(manager.add_client(test_addr(), tx), Some(2));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_capacity_limit() {
        let mut manager = ClientManager::new(1);
        let (tx, _rx) = mpsc::unbounded_channel();

        assert!(manager.add_client(test_addr(), tx.clone()).is_some());
        assert!(manager.add_client(test_addr(), tx).is_none());
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = manager.add_client(test_addr(), tx).unwrap();

        assert!(manager.remove_client(id));
        assert!(!manager.remove_client(id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_set_name_once() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = manager.add_client(test_addr(), tx).unwrap();

        assert_eq!(manager.name(id), None);
        assert!(manager.set_name(id, "alice"));
        assert!(!manager.set_name(id, "mallory"));
        assert_eq!(manager.name(id), Some("alice"));
    }

    #[test]
    fn test_send_reaches_queue() {
        let mut manager = ClientManager::new(2);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = manager.add_client(test_addr(), tx).unwrap();

        assert!(manager.send(id, frame()));
        assert_eq!(rx.try_recv().unwrap(), frame());
        assert!(!manager.send(id + 1, frame()));
    }

    #[test]
    fn test_send_after_writer_dropped() {
        let mut manager = ClientManager::new(2);
        let (tx, rx) = mpsc::unbounded_channel();
        let id = manager.add_client(test_addr(), tx).unwrap();
        drop(rx);

        assert!(!manager.send(id, frame()));
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = manager.add_client(test_addr(), tx).unwrap();

        assert!(manager.check_timeouts(Duration::from_secs(60)).is_empty());

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(manager.check_timeouts(Duration::from_millis(5)), vec![id]);
        assert!(manager.is_empty());
    }
}
