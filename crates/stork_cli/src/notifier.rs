use stork_core::prelude::*;
use stork_notify::{HttpPushNotifier, LogNotifier};

/// The push channel picked at startup.
#[derive(Clone)]
pub enum PushChannel {
    Http(HttpPushNotifier),
    Log(LogNotifier),
}

impl PushChannel {
    pub fn from_config(push_url: Option<String>, push_token: Option<String>) -> Self {
        match push_url {
            Some(url) => Self::Http(HttpPushNotifier::new(url, push_token)),
            None => Self::Log(LogNotifier),
        }
    }
}

impl Notifier for PushChannel {
    async fn send(&self, notification: &PushNotification) -> Result<(), NotificationError> {
        match self {
            Self::Http(notifier) => notifier.send(notification).await,
            Self::Log(notifier) => notifier.send(notification).await,
        }
    }
}
