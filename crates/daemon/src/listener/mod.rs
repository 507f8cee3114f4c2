// SPDX-License-Identifier: MIT

//! Accepts client connections on the IPC endpoint. The server accepts
//! connections sequentially per listener instance but spawns a task per
//! connection, so one slow client cannot block others.

use std::sync::Arc;
use std::time::Duration;

use mb_core::{expand_json_text, validate_backup_config};
use mb_storage::StateStore;
use mb_wire::{read_message, write_message, Action, ProtocolError, Request, Response};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use crate::identity::IdentityResolver;
use crate::supervisor::Supervisor;

/// Shared daemon context handed to every connection handler.
pub struct ListenCtx {
    pub supervisor: Arc<Supervisor>,
    pub identity: Arc<dyn IdentityResolver>,
    pub store: Arc<StateStore>,
}

pub struct Listener {
    socket: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(socket: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { socket, ctx }
    }

    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _addr)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        handle_connection(reader, writer, &ctx).await;
                    });
                }
                Err(e) => error!(error = %e, "failed to accept connection"),
            }
        }
    }
}

async fn pipe_timeout(ctx: &ListenCtx) -> Duration {
    ctx.store
        .load()
        .await
        .map(|c| Duration::from_secs(c.pipe_timeout_seconds))
        .unwrap_or(Duration::from_secs(30))
}

async fn handle_connection<R, W>(mut reader: R, mut writer: W, ctx: &ListenCtx)
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let timeout = pipe_timeout(ctx).await;

    let request: Request = match read_message(&mut reader, timeout).await {
        Ok(req) => req,
        Err(e) => {
            log_protocol_error(&e);
            let _ = write_message(&mut writer, &Response::error_final(format!("malformed request: {e}")), timeout)
                .await;
            return;
        }
    };

    let display_name = match ctx.identity.resolve(&request.sid).await {
        Some(identity) => identity.display_name,
        None => {
            debug!(sid = %request.sid, "could not resolve display name for logging");
            request.sid.clone()
        }
    };

    info!(sid = %request.sid, action = %request.action, "handling request");

    let responses = dispatch(&request, &display_name, ctx).await;
    for (index, response) in responses.iter().enumerate() {
        let is_last = index + 1 == responses.len();
        debug_assert_eq!(response.is_final, is_last);
        if write_message(&mut writer, response, timeout).await.is_err() {
            warn!(sid = %request.sid, "failed to deliver response, client may have disconnected");
            return;
        }
    }
}

/// Returns the full ordered sequence of responses for one request: zero or
/// more non-final progress responses, then exactly one final response.
async fn dispatch(request: &Request, display_name: &str, ctx: &ListenCtx) -> Vec<Response> {
    let Some(action) = request.action() else {
        return vec![Response::error_final(format!("Unknown action: {}", request.action))];
    };

    match action {
        Action::Register => handle_register(request, display_name, ctx).await,
        Action::Unregister => {
            vec![Response::info("Stopping worker..."), ctx.supervisor.unregister(&request.sid, display_name).await]
        }
        Action::Status => vec![ctx.supervisor.status(&request.sid, display_name).await],
    }
}

async fn handle_register(request: &Request, display_name: &str, ctx: &ListenCtx) -> Vec<Response> {
    let mut responses = vec![Response::info("Validating configuration...")];
    let config_path = request.config_path.clone().unwrap_or_default();
    responses.push(Response::info(format!("Config path: {config_path}")));

    if let Some(identity) = ctx.identity.resolve(&request.sid).await {
        match std::fs::read_to_string(&config_path) {
            Ok(raw) => {
                let expanded = expand_json_text(&raw, &identity.home_directory);
                if let Err(errors) = validate_backup_config(&expanded, &identity.home_directory) {
                    responses.push(Response::validation_failure(errors));
                    return responses;
                }
            }
            Err(e) => {
                responses.push(Response::validation_failure(vec![mb_core::ValidationError::new(
                    "JSON",
                    format!("Invalid JSON: cannot read config file: {e}"),
                )]));
                return responses;
            }
        }
    }

    responses.push(ctx.supervisor.register(&request.sid, display_name, &config_path).await);
    responses
}

fn log_protocol_error(e: &ProtocolError) {
    match e {
        ProtocolError::EndOfStream => debug!("client disconnected before sending a request"),
        ProtocolError::Timeout(stage) => warn!(stage, "timed out waiting for client"),
        other => warn!(error = %other, "malformed request"),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
