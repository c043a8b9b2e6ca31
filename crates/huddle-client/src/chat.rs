//! Chat session wrapper.
//!
//! Opens a session against the chat SDK, sends single-target text messages
//! and hands inbound text to a single registered listener.

use async_trait::async_trait;
use huddle_common::{Error, InboundText, OutboundText, Result};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::helpers::lock;

pub type InboundSender = mpsc::UnboundedSender<InboundText>;

/// Callback for inbound text. Only one is installed at a time.
pub type MessageListener = Box<dyn Fn(InboundText) + Send + Sync>;

#[async_trait]
pub trait ChatConnector: Send + Sync {
    /// Logs `user` in. Inbound text messages are pushed to `inbound` for as
    /// long as the connection lives.
    async fn open(
        &self,
        app_key: &str,
        user: &str,
        access_token: &str,
        inbound: InboundSender,
    ) -> Result<Arc<dyn ChatConnection>>;
}

#[async_trait]
pub trait ChatConnection: Send + Sync {
    async fn send(&self, message: &OutboundText) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

pub struct ChatSession {
    connector: Arc<dyn ChatConnector>,
    connection: Option<Arc<dyn ChatConnection>>,
    listener: Arc<Mutex<Option<MessageListener>>>,
    pump: Option<JoinHandle<()>>,
}

impl ChatSession {
    pub fn new(connector: Arc<dyn ChatConnector>) -> Self {
        Self {
            connector,
            connection: None,
            listener: Arc::new(Mutex::new(None)),
            pump: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.connection.is_some()
    }

    /// Opens the chat session. Must be called inside a tokio runtime; the
    /// inbound listener starts only after a successful login.
    pub async fn initialize(&mut self, app_key: &str, user: &str, token: &str) -> Result<()> {
        self.close().await;

        let (tx, mut rx) = mpsc::unbounded_channel::<InboundText>();
        match self.connector.open(app_key, user, token, tx).await {
            Ok(connection) => {
                info!(user, "chat login successful");
                self.connection = Some(connection);
                let listener = self.listener.clone();
                self.pump = Some(tokio::spawn(async move {
                    while let Some(message) = rx.recv().await {
                        match lock(&listener).as_ref() {
                            Some(callback) => callback(message),
                            None => debug!(from = %message.from, "no chat listener, message dropped"),
                        }
                    }
                }));
                Ok(())
            }
            Err(e) => {
                error!(user, "chat login failed: {}", e);
                Err(e)
            }
        }
    }

    /// Installs the message listener, replacing any previous one.
    pub fn on_message_received(&self, listener: MessageListener) {
        *lock(&self.listener) = Some(listener);
    }

    pub async fn send_message(&self, channel_id: &str, text: &str) -> Result<()> {
        let Some(connection) = self.connection.as_ref() else {
            error!("chat client is not initialized");
            return Err(Error::NotInitialized);
        };
        let message = OutboundText::single(channel_id, text);
        match connection.send(&message).await {
            Ok(()) => {
                debug!(to = channel_id, "message sent");
                Ok(())
            }
            Err(e) => {
                error!(to = channel_id, "failed to send message: {}", e);
                Err(e)
            }
        }
    }

    pub async fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                debug!("chat close failed: {}", e);
            }
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Mock chat SDK for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    pub struct MockChatConnector {
        fail_open: AtomicBool,
        fail_send: AtomicBool,
        connections: Mutex<Vec<Arc<MockChatConnection>>>,
        logins: Mutex<Vec<(String, String, String)>>,
    }

    impl MockChatConnector {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn fail_open(&self, fail: bool) {
            self.fail_open.store(fail, Ordering::SeqCst);
        }

        /// Applies to connections opened afterwards.
        pub fn fail_send(&self, fail: bool) {
            self.fail_send.store(fail, Ordering::SeqCst);
        }

        pub fn connection(&self, index: usize) -> Option<Arc<MockChatConnection>> {
            lock(&self.connections).get(index).cloned()
        }

        /// `(app_key, user, token)` of every login attempt.
        pub fn logins(&self) -> Vec<(String, String, String)> {
            lock(&self.logins).clone()
        }
    }

    #[async_trait]
    impl ChatConnector for MockChatConnector {
        async fn open(
            &self,
            app_key: &str,
            user: &str,
            access_token: &str,
            inbound: InboundSender,
        ) -> Result<Arc<dyn ChatConnection>> {
            lock(&self.logins).push((app_key.into(), user.into(), access_token.into()));
            if self.fail_open.load(Ordering::SeqCst) {
                return Err(Error::sdk("invalid token"));
            }
            let connection = Arc::new(MockChatConnection {
                user: user.to_string(),
                inbound,
                sent: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                fail_send: self.fail_send.load(Ordering::SeqCst),
            });
            lock(&self.connections).push(connection.clone());
            Ok(connection)
        }
    }

    pub struct MockChatConnection {
        user: String,
        inbound: InboundSender,
        sent: Mutex<Vec<OutboundText>>,
        closed: AtomicBool,
        fail_send: bool,
    }

    impl MockChatConnection {
        pub fn user(&self) -> &str {
            &self.user
        }

        /// Simulates a message arriving from the chat service.
        pub fn deliver(&self, from: &str, msg: &str) -> bool {
            self.inbound
                .send(InboundText {
                    from: from.into(),
                    to: self.user.clone(),
                    msg: msg.into(),
                })
                .is_ok()
        }

        pub fn sent(&self) -> Vec<OutboundText> {
            lock(&self.sent).clone()
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatConnection for MockChatConnection {
        async fn send(&self, message: &OutboundText) -> Result<()> {
            if self.fail_send {
                return Err(Error::sdk("message rejected"));
            }
            lock(&self.sent).push(message.clone());
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }
}
