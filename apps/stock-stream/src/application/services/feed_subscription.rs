//! Feed Subscription
//!
//! Attaches a listener for one feed id to the upstream transport and tracks
//! whether that feed is merely attached or actually loaded.
//!
//! Attach and detach are idempotent so a handle can never hold two
//! registrations for the same feed, which would double-deliver every update.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::application::ports::{FeedListener, FeedTransport};
use crate::domain::error::FeedError;
use crate::domain::identity::FeedId;
use crate::domain::subscription::SubscriptionHandle;

#[derive(Debug, Clone, Copy)]
struct Attachment {
    feed_id: FeedId,
    handle: SubscriptionHandle,
}

/// A single listener registration with the upstream transport.
pub struct FeedSubscription {
    transport: Arc<dyn FeedTransport>,
    attachment: Mutex<Option<Attachment>>,
}

impl FeedSubscription {
    /// Create a detached subscription on a transport.
    #[must_use]
    pub fn new(transport: Arc<dyn FeedTransport>) -> Self {
        Self {
            transport,
            attachment: Mutex::new(None),
        }
    }

    /// Register `listener` for `feed_id`.
    ///
    /// Calling this while already attached returns the existing handle
    /// without registering again.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::TransportUnavailable`] if the transport is not
    /// ready. The subscription stays detached.
    pub fn attach(
        &self,
        feed_id: FeedId,
        listener: Arc<dyn FeedListener>,
    ) -> Result<SubscriptionHandle, FeedError> {
        let mut attachment = self.attachment.lock();

        if let Some(existing) = *attachment {
            tracing::debug!(
                feed_id = %existing.feed_id,
                requested = %feed_id,
                "Feed already attached"
            );
            return Ok(existing.handle);
        }

        let handle = self.transport.register_listener(feed_id, listener)?;
        *attachment = Some(Attachment { feed_id, handle });
        Ok(handle)
    }

    /// Remove the registration.
    ///
    /// Returns `true` if a registration was removed, `false` if the
    /// subscription was already detached.
    pub fn detach(&self) -> bool {
        let Some(attachment) = self.attachment.lock().take() else {
            return false;
        };
        self.transport.deregister_listener(attachment.handle);
        true
    }

    /// Whether a registration exists.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attachment.lock().is_some()
    }

    /// Whether the feed is attached and the transport reports it loaded.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.feed_id()
            .is_some_and(|feed_id| self.transport.is_feed_loaded(feed_id))
    }

    /// The attached feed id.
    #[must_use]
    pub fn feed_id(&self) -> Option<FeedId> {
        self.attachment.lock().map(|a| a.feed_id)
    }

    /// The transport registration handle.
    #[must_use]
    pub fn handle(&self) -> Option<SubscriptionHandle> {
        self.attachment.lock().map(|a| a.handle)
    }
}

impl std::fmt::Debug for FeedSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSubscription")
            .field("attachment", &*self.attachment.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockFeedTransport;
    use crate::domain::streaming::UpdateNotification;

    struct NullListener;

    impl FeedListener for NullListener {
        fn on_notification(&self, _notification: &UpdateNotification<'_>) {}
    }

    fn listener() -> Arc<dyn FeedListener> {
        Arc::new(NullListener)
    }

    #[test]
    fn attach_registers_once() {
        let mut transport = MockFeedTransport::new();
        transport
            .expect_register_listener()
            .times(1)
            .returning(|_, _| Ok(SubscriptionHandle::new(11)));

        let subscription = FeedSubscription::new(Arc::new(transport));

        let first = subscription.attach(FeedId::new(1), listener()).unwrap();
        let second = subscription.attach(FeedId::new(1), listener()).unwrap();

        assert_eq!(first, second);
        assert!(subscription.is_attached());
        assert_eq!(subscription.feed_id(), Some(FeedId::new(1)));
    }

    #[test]
    fn attach_failure_leaves_detached() {
        let mut transport = MockFeedTransport::new();
        transport
            .expect_register_listener()
            .returning(|_, _| Err(FeedError::TransportUnavailable("offline".to_string())));

        let subscription = FeedSubscription::new(Arc::new(transport));
        let result = subscription.attach(FeedId::new(1), listener());

        assert!(matches!(result, Err(FeedError::TransportUnavailable(_))));
        assert!(!subscription.is_attached());
        assert!(!subscription.is_active());
    }

    #[test]
    fn detach_is_idempotent() {
        let mut transport = MockFeedTransport::new();
        transport
            .expect_register_listener()
            .returning(|_, _| Ok(SubscriptionHandle::new(5)));
        transport
            .expect_deregister_listener()
            .withf(|handle| handle.get() == 5)
            .times(1)
            .return_const(());

        let subscription = FeedSubscription::new(Arc::new(transport));
        subscription.attach(FeedId::new(2), listener()).unwrap();

        assert!(subscription.detach());
        assert!(!subscription.detach());
        assert!(!subscription.is_attached());
    }

    #[test]
    fn active_requires_transport_load() {
        let mut transport = MockFeedTransport::new();
        transport
            .expect_register_listener()
            .returning(|_, _| Ok(SubscriptionHandle::new(1)));
        transport.expect_is_feed_loaded().return_const(false);

        let subscription = FeedSubscription::new(Arc::new(transport));
        subscription.attach(FeedId::new(9), listener()).unwrap();

        assert!(subscription.is_attached());
        assert!(!subscription.is_active());
    }

    #[test]
    fn active_when_transport_loaded() {
        let mut transport = MockFeedTransport::new();
        transport
            .expect_register_listener()
            .returning(|_, _| Ok(SubscriptionHandle::new(1)));
        transport
            .expect_is_feed_loaded()
            .withf(|feed| feed.get() == 9)
            .return_const(true);

        let subscription = FeedSubscription::new(Arc::new(transport));
        assert!(!subscription.is_active());

        subscription.attach(FeedId::new(9), listener()).unwrap();
        assert!(subscription.is_active());
    }
}
