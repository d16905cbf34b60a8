//! A small command bot on top of the connection core.
//!
//! Handlers are registered per command word (e.g. `!ping`). Every `PRIVMSG`
//! whose first word matches a handler runs that handler on its own task, with
//! a [`Sender`] to answer through.

pub mod message;

pub use message::Message;

use std::{
    collections::{BTreeSet, HashMap},
    future::Future,
    sync::Arc,
};

use anyhow::Context;
use futures::{future::BoxFuture, FutureExt};
use tracing::{debug, info, warn};

use crate::irc::{line, Connector, Identity, Options, Proxy, Sender};

type Handler = Arc<dyn Fn(Message, Sender) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

pub struct Bot {
    identity: Identity,
    proxy: Option<Proxy>,
    options: Options,
    handlers: HashMap<String, Handler>,
    channels: BTreeSet<String>,
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("identity", &self.identity)
            .field("proxy", &self.proxy)
            .field("options", &self.options)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("channels", &self.channels)
            .finish()
    }
}

impl Bot {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            proxy: None,
            options: Options::default(),
            handlers: HashMap::new(),
            channels: BTreeSet::new(),
        }
    }

    /// Dial through a SOCKS5 proxy. An empty host with port 0 means direct.
    pub fn set_proxy(&mut self, host: &str, port: u16) -> &mut Self {
        self.proxy = Proxy::from_parts(host, port);
        self
    }

    /// Dial through `proxy`, or directly when `None`.
    pub fn with_proxy(&mut self, proxy: Option<Proxy>) -> &mut Self {
        self.proxy = proxy;
        self
    }

    pub fn with_options(&mut self, options: Options) -> &mut Self {
        self.options = options;
        self
    }

    /// Runs `handler` for every message whose first word is `command`.
    /// Registering the same command again replaces the previous handler.
    pub fn handler<F, Fut>(&mut self, command: &str, handler: F) -> &mut Self
    where
        F: Fn(Message, Sender) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let boxed: Handler =
            Arc::new(move |msg: Message, sender: Sender| handler(msg, sender).boxed());
        self.handlers.insert(command.to_string(), boxed);
        self
    }

    /// Queues a channel to join once registered.
    pub fn join(&mut self, channel: &str) -> &mut Self {
        self.channels.insert(channel.to_string());
        self
    }

    /// Connects, joins the queued channels and dispatches messages until the
    /// connection dies. Always returns an error describing why it stopped.
    pub async fn run(&self, host: &str, port: u16) -> anyhow::Result<()> {
        info!("connecting to {host}:{port} as {}", self.identity.nickname);
        let mut conn = Connector::new(self.identity.clone())
            .with_proxy(self.proxy.clone())
            .with_options(self.options)
            .connect(host, port)
            .await
            .with_context(|| format!("could not connect to {host}:{port}"))?;
        info!("connected");

        let sender = conn.sender();
        for channel in &self.channels {
            info!("joining {channel}");
            sender
                .join(channel)
                .await
                .with_context(|| format!("could not join {channel}"))?;
        }

        while let Some(line) = conn.read().await {
            if line::is_terminal(&line) {
                warn!("connection lost: {line}");
                anyhow::bail!("connection lost: {line}");
            }
            self.dispatch(&line, &sender);
        }

        anyhow::bail!("connection closed")
    }

    fn dispatch(&self, line: &str, sender: &Sender) {
        let Some(msg) = Message::parse(line) else {
            return;
        };
        let Some(handler) = self.handlers.get(msg.command()) else {
            return;
        };

        debug!("[{}] {}: {}", msg.channel, msg.nick, msg.text);
        let command = msg.command().to_string();
        let fut = handler(msg, sender.clone());
        tokio::spawn(async move {
            if let Err(err) = fut.await {
                warn!("handler for {command} failed: {err:#}");
            }
        });
    }
}
