//! In-process connection pair backed by Tokio channels.
//!
//! Unlike the WebSocket transport, which always surfaces whole messages,
//! a [`MemoryConnection`] can push arbitrary partial frames with
//! [`MemoryConnection::send_frame`]. That makes it the tool of choice for
//! exercising message reassembly without a network.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, Frame, TransportError};

/// Creates two connected endpoints. Frames sent on one are received on
/// the other.
pub fn pair() -> (MemoryConnection, MemoryConnection) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (MemoryConnection::new(a_tx, b_rx), MemoryConnection::new(b_tx, a_rx))
}

/// One end of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    outbound: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Frame>>,
    open: AtomicBool,
}

impl MemoryConnection {
    fn new(
        outbound: mpsc::UnboundedSender<Frame>,
        inbound: mpsc::UnboundedReceiver<Frame>,
    ) -> Self {
        Self {
            id: ConnectionId::next(),
            outbound: Mutex::new(Some(outbound)),
            inbound: Mutex::new(inbound),
            open: AtomicBool::new(true),
        }
    }

    /// Sends one raw frame, terminated or not.
    pub async fn send_frame(&self, frame: Frame) -> Result<(), TransportError> {
        let outbound = self.outbound.lock().await;
        let sender = outbound
            .as_ref()
            .ok_or_else(|| TransportError::ConnectionClosed(self.id.to_string()))?;
        sender
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed(self.id.to_string()))
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.send_frame(Frame::last(data)).await
    }

    async fn recv(&self) -> Result<Option<Frame>, Self::Error> {
        match self.inbound.lock().await.recv().await {
            Some(frame) => Ok(Some(frame)),
            None => {
                self.open.store(false, Ordering::SeqCst);
                Ok(None)
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        if self.open.swap(false, Ordering::SeqCst) {
            // Dropping the sender ends the peer's stream.
            self.outbound.lock().await.take();
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_frames_in_order() {
        let (a, b) = pair();
        a.send_frame(Frame::partial("he")).await.unwrap();
        a.send_frame(Frame::last("llo")).await.unwrap();

        assert_eq!(b.recv().await.unwrap(), Some(Frame::partial("he")));
        assert_eq!(b.recv().await.unwrap(), Some(Frame::last("llo")));
    }

    #[tokio::test]
    async fn test_send_is_a_single_terminated_frame() {
        let (a, b) = pair();
        a.send(b"{}").await.unwrap();
        assert_eq!(b.recv().await.unwrap(), Some(Frame::last("{}")));
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream() {
        let (a, b) = pair();
        a.close().await.unwrap();

        assert!(!a.is_open());
        assert_eq!(b.recv().await.unwrap(), None);
        assert!(!b.is_open());
    }

    #[tokio::test]
    async fn test_close_twice_is_noop() {
        let (a, _b) = pair();
        a.close().await.unwrap();
        a.close().await.unwrap();
        assert!(!a.is_open());
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (a, _b) = pair();
        a.close().await.unwrap();
        let result = a.send(b"late").await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_endpoints_have_distinct_ids() {
        let (a, b) = pair();
        assert_ne!(a.id(), b.id());
    }
}
