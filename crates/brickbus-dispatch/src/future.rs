//! One-shot promise for a single decoded response.

use brickbus_core::{Error, Result};
use std::time::Duration;
use tokio::sync::oneshot;

/// The receiving half of a one-shot subscription built with
/// [`DeviceBuilder::build_future`](crate::DeviceBuilder::build_future).
///
/// Resolves with the decoded result of the first matching response. If the
/// producing device is dropped before anything arrives (dispatcher shutdown,
/// unsubscribe), the future resolves with `Error::ChannelClosed` instead of
/// hanging.
#[derive(Debug)]
pub struct PacketFuture<R> {
    rx: oneshot::Receiver<Result<R>>,
}

impl<R> PacketFuture<R> {
    pub(crate) fn new(rx: oneshot::Receiver<Result<R>>) -> Self {
        PacketFuture { rx }
    }

    /// Wait for the response, however long it takes.
    ///
    /// # Errors
    /// Returns the decode or device error carried by the response, or
    /// `Error::ChannelClosed` if the producing side went away.
    pub async fn wait(self) -> Result<R> {
        self.rx.await.unwrap_or(Err(Error::ChannelClosed))
    }

    /// Wait for the response, giving up after `timeout`.
    ///
    /// # Errors
    /// As [`wait`](Self::wait), plus `Error::Timeout` when nothing arrived in
    /// time.
    pub async fn wait_timeout(self, timeout: Duration) -> Result<R> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(result) => result.unwrap_or(Err(Error::ChannelClosed)),
            Err(_) => Err(Error::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_with_sent_value() {
        let (tx, rx) = oneshot::channel();
        let future = PacketFuture::new(rx);
        tx.send(Ok(42u16)).unwrap();
        assert_eq!(future.wait().await, Ok(42));
    }

    #[tokio::test]
    async fn test_dropped_sender_resolves_channel_closed() {
        let (tx, rx) = oneshot::channel::<Result<u16>>();
        let future = PacketFuture::new(rx);
        drop(tx);
        assert_eq!(future.wait().await, Err(Error::ChannelClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_expires() {
        let (_tx, rx) = oneshot::channel::<Result<u16>>();
        let future = PacketFuture::new(rx);
        assert_eq!(
            future.wait_timeout(Duration::from_millis(50)).await,
            Err(Error::Timeout)
        );
    }
}
