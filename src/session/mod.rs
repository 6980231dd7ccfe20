//! Turn orchestration.
//!
//! A [`StreamSession`] drives one conversational turn end to end: it pulls
//! fragments from the model-output source, feeds them through the
//! [`StreamFilter`], forwards clean text to the transport sink immediately,
//! and dispatches extracted payloads as independent tasks that never block
//! text delivery. Client-visible text is strictly prioritized over
//! control-payload bookkeeping: `payload_applied` events wait until every
//! `token` event has been sent.

pub mod events;
pub mod registry;

pub use events::TurnEvent;
pub use registry::{SessionHandle, SessionRegistry};

use crate::dispatch::{DispatchOutcome, PayloadDispatcher};
use crate::error::{Result, SessionError};
use crate::filter::{FilterOutput, StreamFilter};
use crate::marker::MarkerRegistry;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Failure reported by the model-output source mid-stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct SourceError(pub String);

/// Ordered, fallible sink of turn events toward the client.
///
/// Sending may suspend (the transport may apply backpressure); it is the
/// only suspension point on the text-forwarding path.
#[async_trait]
pub trait TransportSink: Send + Sync {
    /// Delivers one event, preserving call order.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is gone; this aborts the turn.
    async fn send(&self, event: TurnEvent) -> Result<()>;
}

/// Final accounting for one completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSummary {
    /// Full reconstructed clean text of the turn.
    pub clean_text: String,

    /// Number of `token` events emitted.
    pub fragments_emitted: u64,

    /// Number of payloads handed to the dispatcher.
    pub payloads_dispatched: usize,

    /// Number of payloads whose effect was applied.
    pub payloads_applied: usize,
}

/// One end-to-end conversational turn.
///
/// Owns its filter state exclusively; nothing here is shared across
/// sessions except the marker registry and the dispatcher's collaborators.
pub struct StreamSession {
    /// Conversation id (registry key, log correlation).
    id: String,
    /// Subject id field updates are written against.
    subject_id: String,
    /// The tag-suppressing filter for this stream.
    filter: StreamFilter,
    /// Payload dispatcher shared with other sessions.
    dispatcher: Arc<PayloadDispatcher>,
    /// Cancellation token for this turn and its dispatch tasks.
    cancel: CancellationToken,
    /// Count of `token` events emitted so far.
    fragments_emitted: u64,
}

impl StreamSession {
    /// Creates a session for one turn.
    #[must_use]
    pub fn new(
        id: &str,
        subject_id: &str,
        registry: Arc<MarkerRegistry>,
        dispatcher: Arc<PayloadDispatcher>,
    ) -> Self {
        Self {
            id: id.to_string(),
            subject_id: subject_id.to_string(),
            filter: StreamFilter::new(registry),
            dispatcher,
            cancel: CancellationToken::new(),
            fragments_emitted: 0,
        }
    }

    /// Returns the conversation id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the subject id.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Returns a clone of this session's cancellation token.
    ///
    /// Hand this to a [`SessionHandle`](registry::SessionHandle) so a
    /// disconnect can stop the turn.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drives the turn to completion.
    ///
    /// Emits `thinking`, then ordered `token` events as clean text becomes
    /// safe to forward, then `payload_applied` events in extraction order
    /// once every dispatch task has settled, then a single `complete`.
    /// An unterminated marker at stream end is flushed as plain text.
    ///
    /// # Errors
    ///
    /// Returns an error when the source fails (an `error` event is sent in
    /// place of `complete`), when the transport fails (nothing more can be
    /// sent), or when the turn is cancelled (silent close). In-flight
    /// dispatch tasks are aborted in every error path; other sessions are
    /// unaffected.
    pub async fn run<S, T>(&mut self, source: S, sink: &T) -> Result<TurnSummary>
    where
        S: Stream<Item = std::result::Result<String, SourceError>> + Unpin + Send,
        T: TransportSink + ?Sized,
    {
        let mut tasks: JoinSet<(usize, Option<DispatchOutcome>)> = JoinSet::new();
        match self.run_inner(source, sink, &mut tasks).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                tasks.abort_all();
                // Source failures surface to the client; transport failures
                // and cancellation close silently.
                if matches!(e, SessionError::Source(_)) {
                    let event = TurnEvent::Error {
                        message: e.to_string(),
                    };
                    if let Err(send_err) = sink.send(event).await {
                        warn!(session = %self.id, error = %send_err,
                            "could not deliver error event");
                    }
                }
                Err(e.into())
            }
        }
    }

    async fn run_inner<S, T>(
        &mut self,
        mut source: S,
        sink: &T,
        tasks: &mut JoinSet<(usize, Option<DispatchOutcome>)>,
    ) -> std::result::Result<TurnSummary, SessionError>
    where
        S: Stream<Item = std::result::Result<String, SourceError>> + Unpin + Send,
        T: TransportSink + ?Sized,
    {
        self.send(sink, TurnEvent::Thinking).await?;

        let mut clean_text = String::new();
        let mut dispatched = 0usize;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!(session = %self.id, "turn cancelled");
                    return Err(SessionError::Cancelled);
                }
                item = source.next() => match item {
                    None => break,
                    Some(Err(e)) => {
                        warn!(session = %self.id, error = %e, "token source failed");
                        return Err(SessionError::Source(e.to_string()));
                    }
                    Some(Ok(fragment)) => {
                        let out = self.filter.push(&fragment);
                        self.forward(&out, sink, tasks, &mut clean_text, &mut dispatched)
                            .await?;
                    }
                }
            }
        }

        // Stream ended: flush whatever is still withheld. An unterminated
        // marker becomes visible text instead of silently disappearing.
        let tail = self.filter.finish();
        self.forward(&tail, sink, tasks, &mut clean_text, &mut dispatched)
            .await?;

        // Every dispatched payload must settle before the turn is reported
        // complete. Tasks finish in arbitrary order; events go out in
        // extraction order.
        let mut outcomes: Vec<(usize, DispatchOutcome)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, Some(outcome))) => outcomes.push((idx, outcome)),
                Ok((_, None)) => {}
                Err(e) => warn!(session = %self.id, error = %e, "dispatch task failed"),
            }
        }
        outcomes.sort_by_key(|(idx, _)| *idx);
        let payloads_applied = outcomes.iter().filter(|(_, o)| o.applied).count();
        for (_, outcome) in outcomes {
            self.send(sink, TurnEvent::PayloadApplied { outcome }).await?;
        }

        self.send(
            sink,
            TurnEvent::Complete {
                content: clean_text.clone(),
            },
        )
        .await?;
        debug!(session = %self.id, fragments = self.fragments_emitted,
            dispatched, "turn complete");

        Ok(TurnSummary {
            clean_text,
            fragments_emitted: self.fragments_emitted,
            payloads_dispatched: dispatched,
            payloads_applied,
        })
    }

    /// Forwards one filter step: clean text to the sink now, payloads to
    /// dispatch tasks that run without blocking further forwarding.
    async fn forward<T>(
        &mut self,
        out: &FilterOutput,
        sink: &T,
        tasks: &mut JoinSet<(usize, Option<DispatchOutcome>)>,
        clean_text: &mut String,
        dispatched: &mut usize,
    ) -> std::result::Result<(), SessionError>
    where
        T: TransportSink + ?Sized,
    {
        if !out.clean.is_empty() {
            self.fragments_emitted += 1;
            clean_text.push_str(&out.clean);
            self.send(
                sink,
                TurnEvent::Token {
                    token: out.clean.clone(),
                },
            )
            .await?;
        }
        for payload in &out.payloads {
            let dispatcher = Arc::clone(&self.dispatcher);
            let subject = self.subject_id.clone();
            let payload = payload.clone();
            let idx = *dispatched;
            *dispatched += 1;
            tasks.spawn(async move { (idx, dispatcher.dispatch(&subject, &payload).await) });
        }
        Ok(())
    }

    async fn send<T>(&self, sink: &T, event: TurnEvent) -> std::result::Result<(), SessionError>
    where
        T: TransportSink + ?Sized,
    {
        sink.send(event)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }
}
