//! Per-connection lifecycle
//!
//! Each accepted socket runs through
//! `Accepted -> NegotiatingName -> Active -> Closing -> Closed` in its own
//! task. Errors stay inside that task; nothing here can stall another
//! connection beyond the registry's own short critical section.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::{Inbound, Outbound};
use crate::command::Command;
use crate::connection::Connection;
use crate::error::AppError;
use crate::message::Message;
use crate::registry::Registry;
use crate::router::{deliver, Router};
use crate::types::{validate_username, ConnectionId};

/// How long teardown waits for queued frames to reach the socket
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of processing one inbound line
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Handle a new TCP connection
///
/// Negotiates a username, runs the processing loop and tears the
/// connection down. Returns once the socket is released.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let id = ConnectionId::new();
    info!("Connection {} accepted from {}", id, addr);

    let (reader, writer) = stream.into_split();
    let mut inbound = Inbound::new(reader);
    let (outbound, writer_task) = Outbound::spawn(writer);

    let negotiated = negotiate(
        id,
        addr,
        &mut inbound,
        &outbound,
        router.registry(),
        &shutdown,
    )
    .await;

    let result = match negotiated {
        Ok(Some((connection, peers))) => {
            let result = run_active(&connection, &peers, &mut inbound, &router, &shutdown).await;
            teardown(&connection, &router).await;
            result
        }
        Ok(None) => {
            debug!("Connection {} closed during negotiation", id);
            Ok(())
        }
        Err(e) => Err(e),
    };

    // Release the write side; the writer drains what is queued, then closes
    drop(outbound);
    let abort = writer_task.abort_handle();
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer_task)
        .await
        .is_err()
    {
        warn!("Connection {} writer did not drain in time", id);
        abort.abort();
    }

    info!("Connection {} closed", id);
    result
}

/// Prompt until a username is registered
///
/// Yields the registered connection and the peers that were registered
/// before it, or `None` if the peer leaves (or the server stops) first.
async fn negotiate<R>(
    id: ConnectionId,
    addr: SocketAddr,
    inbound: &mut Inbound<R>,
    outbound: &Outbound,
    registry: &Registry,
    shutdown: &CancellationToken,
) -> Result<Option<(Connection, Vec<Connection>)>, AppError>
where
    R: AsyncRead + Unpin,
{
    loop {
        if outbound.send(Message::prompt()).is_err() {
            return Ok(None);
        }

        let received = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                let _ = outbound.send(Message::shutting_down());
                return Ok(None);
            }
            _ = outbound.closed() => return Ok(None),
            received = inbound.receive() => received,
        };

        let line = match received {
            Ok(line) => line,
            Err(AppError::ChannelClosed) => return Ok(None),
            Err(e @ AppError::FrameTooLong) => {
                let _ = outbound.send(e.into());
                continue;
            }
            Err(e) => return Err(e),
        };

        let username = line.trim();
        if let Err(reason) = validate_username(username) {
            debug!("Connection {} offered invalid username: {}", id, reason);
            let _ = outbound.send(AppError::InvalidUsername(reason).into());
            continue;
        }

        let connection = Connection::new(id, addr, username.to_string(), outbound.clone());
        match registry
            .register(connection.clone(), Message::welcome(username))
            .await
        {
            Ok(peers) => return Ok(Some((connection, peers))),
            Err(e @ AppError::NameTaken(_)) => {
                let _ = outbound.send(e.into());
            }
            Err(e) => return Err(e),
        }
    }
}

/// Announce the newcomer and process frames until the connection closes
///
/// The welcome was queued on registration, ahead of any broadcast.
async fn run_active<R>(
    connection: &Connection,
    peers: &[Connection],
    inbound: &mut Inbound<R>,
    router: &Router,
    shutdown: &CancellationToken,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
{
    router.announce(peers, Message::joined(&connection.username));

    loop {
        let received = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                deliver(connection, Message::shutting_down());
                return Ok(());
            }
            _ = connection.closed() => {
                debug!("Connection {} outbound closed", connection.id);
                return Ok(());
            }
            received = inbound.receive() => received,
        };

        match received {
            Ok(line) => {
                if process_line(connection, &line, router).await? == Flow::Quit {
                    return Ok(());
                }
            }
            Err(e @ AppError::FrameTooLong) => {
                deliver(connection, e.into());
            }
            Err(AppError::ChannelClosed) => {
                debug!("Connection {} closed by peer", connection.id);
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

/// Route a plain chat line or dispatch a command
async fn process_line(
    connection: &Connection,
    line: &str,
    router: &Router,
) -> Result<Flow, AppError> {
    if line.trim().is_empty() {
        return Ok(Flow::Continue);
    }

    if !Command::is_command(line) {
        router
            .broadcast(Message::chat(&connection.username, line), Some(connection.id))
            .await?;
        return Ok(Flow::Continue);
    }

    match Command::parse(line) {
        Ok(cmd) => dispatch(connection, cmd, router).await,
        Err(e) => {
            debug!("Rejected command from '{}': {}", connection.username, e);
            deliver(connection, e.into());
            Ok(Flow::Continue)
        }
    }
}

/// Execute a parsed command on behalf of `connection`
async fn dispatch(
    connection: &Connection,
    cmd: Command,
    router: &Router,
) -> Result<Flow, AppError> {
    match cmd {
        Command::Quit => {
            deliver(connection, Message::goodbye());
            return Ok(Flow::Quit);
        }
        Command::Online => router.online(connection).await?,
        Command::Help => {
            for msg in Message::help() {
                deliver(connection, msg);
            }
        }
        Command::Whisper { recipient, text } => {
            match router.whisper(connection, &recipient, &text).await {
                // The sender already got the not-online notice
                Ok(()) | Err(AppError::RecipientNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
    }
    Ok(Flow::Continue)
}

/// Remove the connection and announce the departure
///
/// Only the call that actually removed the entry announces it.
async fn teardown(connection: &Connection, router: &Router) {
    match router.registry().unregister(connection.id).await {
        Ok(true) => {
            if let Err(e) = router
                .broadcast(Message::left(&connection.username), None)
                .await
            {
                warn!("Failed to announce departure of '{}': {}", connection.username, e);
            }
        }
        Ok(false) => {}
        Err(e) => warn!("Failed to unregister {}: {}", connection.id, e),
    }
}
