//! IRC client session for one configured server.
//!
//! A session connects, registers, joins its channels once the server
//! welcomes it and then processes inbound lines strictly in order:
//!
//! - channel PRIVMSG/NOTICE text goes to the [`Dispatcher`]
//! - a `DCC SEND` CTCP is correlated with a pending request and handed to
//!   the transfer pool, which runs it on its own task
//! - PING is answered, nick collisions retry with `_` appended
//!
//! A link silent for `ping_interval_secs` gets a PING of our own; if
//! nothing at all arrives within `ping_timeout_secs` after that the link
//! is treated as dead.
//!
//! When the link drops the session waits `reconnect_delay_secs` and starts
//! over. Cancelling the shutdown token, or disconnecting through the
//! handle, sends QUIT and ends the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xdcc_proto::{Ctcp, CtcpKind, DccSend, Message};

use super::codec::IrcCodec;
use super::registry::{SessionHandle, SessionRegistry};
use crate::config::XdccServerConfig;
use crate::error::SessionError;
use crate::metrics;
use crate::observer::Dispatcher;
use crate::tracker::RequestTracker;
use crate::transfer::{TransferJob, TransferPool};

const OUTBOUND_QUEUE: usize = 64;
const KEEPALIVE_TOKEN: &str = "downer";
const VERSION_REPLY: &str = concat!("downer ", env!("CARGO_PKG_VERSION"));

type IrcFramed = Framed<TcpStream, IrcCodec>;

/// Everything a session hands inbound traffic to.
pub struct SessionContext {
    pub dispatcher: Dispatcher,
    pub tracker: Arc<RequestTracker>,
    pub pool: Arc<TransferPool>,
    pub registry: Arc<SessionRegistry>,
}

/// Handle to a connected session, registered once the server sent 001.
pub struct IrcHandle {
    server: String,
    outbound: mpsc::Sender<Message>,
    connected: AtomicBool,
}

impl IrcHandle {
    fn new(server: &str, outbound: mpsc::Sender<Message>) -> Self {
        Self {
            server: server.to_string(),
            outbound,
            connected: AtomicBool::new(true),
        }
    }

    fn mark_closed(&self) {
        self.connected.store(false, Ordering::Release);
    }

    async fn send(&self, msg: Message) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::Closed);
        }
        self.outbound
            .send(msg)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

#[async_trait]
impl SessionHandle for IrcHandle {
    fn server(&self) -> &str {
        &self.server
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn send_message(&self, target: &str, text: &str) -> Result<(), SessionError> {
        self.send(Message::privmsg(target, text)).await
    }

    async fn join(&self, channel: &str) -> Result<(), SessionError> {
        self.send(Message::join(channel)).await
    }

    async fn disconnect(&self, reason: &str) -> Result<(), SessionError> {
        let result = self.send(Message::quit(reason)).await;
        self.mark_closed();
        result
    }
}

pub struct Session {
    name: String,
    config: XdccServerConfig,
    ctx: Arc<SessionContext>,
    shutdown: CancellationToken,
}

impl Session {
    pub fn new(
        name: &str,
        config: XdccServerConfig,
        ctx: Arc<SessionContext>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            name: name.to_string(),
            config,
            ctx,
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Connect, and reconnect after every drop until shutdown.
    pub async fn run(self) {
        let delay = Duration::from_secs(self.config.reconnect_delay_secs);
        loop {
            match self.connect().await {
                Ok(()) => {
                    info!(server = %self.name, "IRC session ended");
                    break;
                }
                Err(e) => warn!(server = %self.name, error = %e, "IRC session failed"),
            }

            if self.shutdown.is_cancelled() {
                break;
            }
            info!(server = %self.name, delay_secs = delay.as_secs(), "Reconnecting after delay");
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One connection: register, then pump lines until the link ends.
    ///
    /// Returns `Ok` only when the session was told to stop, by shutdown or
    /// by [`SessionHandle::disconnect`]; a dropped link is an error.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let addr = self.config.server.clone();
        let connect_timeout = self.config.connect_timeout();
        let stream = tokio::select! {
            _ = self.shutdown.cancelled() => return Ok(()),
            result = timeout(connect_timeout, TcpStream::connect(&addr)) => result
                .map_err(|_| SessionError::Timeout {
                    phase: "connect",
                    secs: connect_timeout.as_secs(),
                })?
                .map_err(|source| SessionError::Connect { addr: addr.clone(), source })?,
        };
        info!(server = %self.name, addr = %addr, "Connected to IRC server");

        let mut framed = Framed::new(stream, IrcCodec::new());
        let (tx, mut rx) = mpsc::channel(OUTBOUND_QUEUE);
        let handle = Arc::new(IrcHandle::new(&self.name, tx));
        let mut state = LinkState {
            nick: self.config.nickname.clone(),
            registered: false,
        };

        framed.send(Message::nick(&state.nick)).await?;
        framed
            .send(Message::user(&self.config.username, self.config.realname()))
            .await?;

        let ping_interval = self.config.ping_interval();
        let ping_timeout = self.config.ping_timeout();
        let mut deadline = Instant::now() + ping_interval;
        let mut awaiting_pong = false;

        let result = loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = framed.send(Message::quit("Shutting down")).await;
                    break Ok(());
                }
                Some(msg) = rx.recv() => {
                    let quit = msg.command == "QUIT";
                    if let Err(e) = framed.send(msg).await {
                        break Err(e);
                    }
                    if quit {
                        break Ok(());
                    }
                }
                _ = sleep_until(deadline) => {
                    if awaiting_pong {
                        break Err(SessionError::Timeout {
                            phase: "ping",
                            secs: ping_timeout.as_secs(),
                        });
                    }
                    debug!(server = %self.name, "Link idle, sending PING");
                    if let Err(e) = framed.send(Message::ping(KEEPALIVE_TOKEN)).await {
                        break Err(e);
                    }
                    awaiting_pong = true;
                    deadline = Instant::now() + ping_timeout;
                }
                line = framed.next() => match line {
                    None => break Err(SessionError::Closed),
                    Some(Err(e)) => break Err(e),
                    Some(Ok(line)) => {
                        awaiting_pong = false;
                        deadline = Instant::now() + ping_interval;
                        if let Err(e) = self.handle_line(&mut framed, &handle, &mut state, &line).await {
                            break Err(e);
                        }
                    }
                },
            }
        };

        handle.mark_closed();
        if state.registered {
            self.ctx.registry.unregister(&self.name);
            metrics::server_disconnected();
        }
        result
    }

    async fn handle_line(
        &self,
        framed: &mut IrcFramed,
        handle: &Arc<IrcHandle>,
        state: &mut LinkState,
        line: &str,
    ) -> Result<(), SessionError> {
        let msg: Message = match line.parse() {
            Ok(msg) => msg,
            Err(e) => {
                debug!(server = %self.name, error = %e, "Ignoring unparsable line");
                return Ok(());
            }
        };

        match msg.command.as_str() {
            "PING" => {
                framed.send(Message::pong(msg.trailing().unwrap_or(""))).await?;
            }
            "001" => {
                if let Some(nick) = msg.param(0) {
                    state.nick = nick.to_string();
                }
                state.registered = true;
                self.ctx.registry.register(Arc::clone(handle) as Arc<dyn SessionHandle>);
                metrics::server_connected();
                info!(server = %self.name, nick = %state.nick, "Registered with IRC server");
                for channel in &self.config.channels {
                    framed.send(Message::join(channel)).await?;
                }
            }
            // ERR_NICKNAMEINUSE, ERR_NICKCOLLISION
            "433" | "436" if !state.registered => {
                state.nick.push('_');
                info!(server = %self.name, nick = %state.nick, "Nickname in use, retrying");
                framed.send(Message::nick(&state.nick)).await?;
            }
            "JOIN" => {
                if msg.source_nick() == Some(state.nick.as_str()) {
                    info!(server = %self.name, channel = ?msg.param(0), "Joined channel");
                }
            }
            "NICK" => {
                if msg.source_nick() == Some(state.nick.as_str())
                    && let Some(new) = msg.param(0)
                {
                    state.nick = new.to_string();
                }
            }
            "PRIVMSG" | "NOTICE" => {
                self.handle_text(framed, state, &msg).await?;
            }
            "ERROR" => {
                return Err(SessionError::ServerError(
                    msg.trailing().unwrap_or_default().to_string(),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    async fn handle_text(
        &self,
        framed: &mut IrcFramed,
        state: &LinkState,
        msg: &Message,
    ) -> Result<(), SessionError> {
        let (Some(sender), Some(target), Some(text)) =
            (msg.source_nick(), msg.param(0), msg.trailing())
        else {
            return Ok(());
        };
        if msg.params.len() < 2 {
            return Ok(());
        }

        if let Some(ctcp) = Ctcp::parse(text) {
            match ctcp.kind {
                CtcpKind::Dcc if target.eq_ignore_ascii_case(&state.nick) => {
                    self.handle_dcc(sender, ctcp.params.unwrap_or_default())
                }
                CtcpKind::Dcc => {
                    debug!(server = %self.name, from = %sender, target = %target, "Ignoring DCC not addressed to us");
                }
                CtcpKind::Version if msg.command == "PRIVMSG" => {
                    let reply = Ctcp::version_reply(VERSION_REPLY).to_string();
                    framed
                        .send(Message::new("NOTICE", &[sender, reply.as_str()]))
                        .await?;
                }
                _ => {}
            }
            return Ok(());
        }

        if is_channel(target) {
            self.ctx.dispatcher.dispatch(&self.name, sender, target, text);
        } else if target.eq_ignore_ascii_case(&state.nick) {
            debug!(server = %self.name, from = %sender, text = %text, "Private message");
        }
        Ok(())
    }

    fn handle_dcc(&self, sender: &str, params: &str) {
        let offer = match DccSend::parse(params) {
            Ok(offer) => offer,
            Err(e) => {
                debug!(server = %self.name, from = %sender, error = %e, "Ignoring DCC");
                return;
            }
        };

        let request = self.ctx.tracker.claim(&self.name, sender);
        if request.is_none() {
            info!(server = %self.name, from = %sender, file = %offer.filename, "Accepting unsolicited DCC SEND");
        }
        info!(
            server = %self.name,
            from = %sender,
            file = %offer.filename,
            ip = %offer.ipv4(),
            port = offer.port,
            size = ?offer.size,
            request = ?request,
            "DCC SEND received"
        );

        let job = TransferJob {
            server: self.name.clone(),
            nick: sender.to_string(),
            offer,
            request,
        };
        if let Err(e) = self.ctx.pool.submit(job) {
            warn!(server = %self.name, from = %sender, error = %e, "Transfer not started");
        }
    }
}

struct LinkState {
    nick: String,
    registered: bool,
}

fn is_channel(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}
