//! JSON-lines bridge between a chat gateway process and the dispatcher.
//!
//! Each stdin line is one `Interaction`; each stdout line is one
//! `WireReply` carrying the interaction's `id`. Interactions run
//! concurrently, so replies may come back out of order.

use std::sync::Arc;

use facet::Facet;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::command::Interaction;
use crate::dispatcher::Dispatcher;
use crate::error::GateError;
use crate::proxmox::VmApi;
use crate::reply::{Reply, Suggestion, Tone};

#[derive(Debug, Clone, PartialEq, Facet)]
pub struct WireReply {
    pub id: String,
    pub tone: String,
    pub color: u32,
    pub text: String,
    pub suggestions: Vec<Suggestion>,
}

impl WireReply {
    pub fn from_reply(id: &str, reply: Reply) -> Self {
        Self {
            id: id.to_string(),
            tone: reply.tone.as_str().to_string(),
            color: reply.tone.color(),
            text: reply.text,
            suggestions: Vec::new(),
        }
    }

    pub fn from_suggestions(id: &str, suggestions: Vec<Suggestion>) -> Self {
        Self {
            id: id.to_string(),
            tone: Tone::Neutral.as_str().to_string(),
            color: Tone::Neutral.color(),
            text: String::new(),
            suggestions,
        }
    }

    pub fn to_json(&self) -> Result<String, GateError> {
        facet_json::to_string(self).map_err(|e| GateError::Encode {
            what: "reply".into(),
            message: e.to_string(),
        })
    }
}

/// Handle one inbound line. `None` means the interaction was not ours.
pub async fn handle_line<A: VmApi>(dispatcher: &Dispatcher<A>, line: &str) -> Option<WireReply> {
    let interaction: Interaction = match facet_json::from_str(line) {
        Ok(i) => i,
        Err(e) => {
            tracing::warn!(error = %e, "malformed interaction");
            let reply = Reply::failed("Invalid interaction", &e);
            return Some(WireReply::from_reply("", reply));
        }
    };

    if interaction.autocomplete {
        if !interaction.is_for_us() {
            return None;
        }
        let suggestions = dispatcher.suggest_for(&interaction).await;
        return Some(WireReply::from_suggestions(&interaction.id, suggestions));
    }

    dispatcher
        .handle(&interaction)
        .await
        .map(|reply| WireReply::from_reply(&interaction.id, reply))
}

/// Serve interactions from `input` until EOF, writing replies to `output`.
///
/// Returns once every in-flight interaction has replied.
pub async fn run<A, R, W>(
    dispatcher: Arc<Dispatcher<A>>,
    input: R,
    output: W,
) -> Result<(), GateError>
where
    A: VmApi,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<WireReply>(64);

    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(reply) = rx.recv().await {
            let mut line = reply.to_json()?;
            line.push('\n');
            output
                .write_all(line.as_bytes())
                .await
                .map_err(|source| GateError::Io {
                    context: "writing reply".into(),
                    source,
                })?;
            output.flush().await.map_err(|source| GateError::Io {
                context: "flushing reply".into(),
                source,
            })?;
        }
        Ok::<(), GateError>(())
    });

    let mut tasks = JoinSet::new();
    let mut input = input;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = input
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|source| GateError::Io {
                context: "reading interaction".into(),
                source,
            })?;
        if n == 0 {
            break;
        }

        // A line that is not UTF-8 is answered like any other malformed
        // interaction and does not end the session.
        let line = match String::from_utf8(std::mem::take(&mut buf)) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "interaction is not valid UTF-8");
                let reply = Reply::failed("Invalid interaction", &e);
                if tx.send(WireReply::from_reply("", reply)).await.is_err() {
                    break;
                }
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let dispatcher = Arc::clone(&dispatcher);
        let tx = tx.clone();
        tasks.spawn(async move {
            if let Some(reply) = handle_line(&dispatcher, line.trim_end()).await {
                // Receiver only goes away if the writer failed; that error
                // is reported below.
                let _ = tx.send(reply).await;
            }
        });
    }

    while let Some(res) = tasks.join_next().await {
        if let Err(e) = res {
            tracing::error!(error = %e, "interaction task failed");
        }
    }
    drop(tx);

    writer.await.map_err(|e| GateError::Io {
        context: "reply writer task".into(),
        source: std::io::Error::other(e),
    })?
}
