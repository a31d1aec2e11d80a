//! Runs one query from pre-flight status messages through the streamed answer.
//!
//! Phases: idle → connecting → preparing → streaming → completed, or failed
//! from any phase after idle. Only one status line is ever live: the pre-flight
//! line is stopped before the streaming line takes over the row.

use crate::llm::{StreamEvent, StreamingBackend};
use crate::query::{Query, QueryError, QueryResult};
use crate::terminal::{OutputStyle, StatusLine, StreamRenderer, StreamStats};
use chrono::Local;
use futures::StreamExt;
use std::fmt;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const CONNECTING_TEXT: &str = "Connecting to AI model...";
const PREPARING_TEXT: &str = "Preparing to generate response...";
const GENERATING_TEXT: &str = "Generating response...";
const COMPLETED_TEXT: &str = "Response completed!";
const FAILED_TEXT: &str = "Failed to generate response";

/// How long each pre-flight status stays on screen before moving on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub connect: Duration,
    pub prepare: Duration,
}

impl Pacing {
    /// No pauses at all.
    pub fn none() -> Self {
        Self {
            connect: Duration::ZERO,
            prepare: Duration::ZERO,
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            connect: Duration::from_millis(500),
            prepare: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
    Idle,
    Connecting,
    Preparing,
    Streaming,
    Completed,
    Failed,
}

impl fmt::Display for QueryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryPhase::Idle => "idle",
            QueryPhase::Connecting => "connecting",
            QueryPhase::Preparing => "preparing",
            QueryPhase::Streaming => "streaming",
            QueryPhase::Completed => "completed",
            QueryPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Drives a backend and the terminal for one query at a time.
pub struct QueryOrchestrator<B> {
    backend: B,
    pacing: Pacing,
    style: OutputStyle,
}

impl<B: StreamingBackend> QueryOrchestrator<B> {
    pub fn new(backend: B, pacing: Pacing, style: OutputStyle) -> Self {
        Self {
            backend,
            pacing,
            style,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run `query` to completion.
    ///
    /// `status` is the caller's live status line, used for the pre-flight
    /// messages. Streaming gets its own line once `status` has been stopped.
    /// On failure the line that is live at that point is marked failed and no
    /// result is produced.
    pub async fn process_query<W: Write>(
        &self,
        query: &Query,
        status: &mut StatusLine,
        out: &mut W,
    ) -> Result<QueryResult, QueryError> {
        let started = Instant::now();
        let mut phase = QueryPhase::Idle;

        let preflight = [
            (QueryPhase::Connecting, CONNECTING_TEXT, self.pacing.connect),
            (QueryPhase::Preparing, PREPARING_TEXT, self.pacing.prepare),
        ];
        for (next, text, delay) in preflight {
            self.advance(&mut phase, next);
            if let Err(e) = status.set_text(out, text) {
                self.advance(&mut phase, QueryPhase::Failed);
                // The row may be half written; replace it with the failure line.
                mark_failed(status.fail(out, FAILED_TEXT));
                return Err(QueryError::Preflight(e));
            }
            pause(delay).await;
        }
        self.advance(&mut phase, QueryPhase::Streaming);

        match self.stream_response(query, status, out).await {
            Ok((response, stats)) => {
                self.advance(&mut phase, QueryPhase::Completed);
                info!(
                    words = stats.word_count,
                    chars = stats.char_count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Query completed"
                );
                let timestamp = Local::now();
                // The response is already complete and marked as such.
                if let Err(e) = self.print_summary(out, &stats, started.elapsed(), timestamp) {
                    warn!("Could not print query summary: {}", e);
                }
                Ok(QueryResult {
                    query: query.to_string(),
                    response,
                    suggestions: None,
                    timestamp,
                })
            }
            Err(e) => {
                self.advance(&mut phase, QueryPhase::Failed);
                warn!("Query failed: {:#}", e);
                Err(QueryError::Stream(e))
            }
        }
    }

    /// Hand the row over to a streaming status line and render the response.
    async fn stream_response<W: Write>(
        &self,
        query: &Query,
        status: &mut StatusLine,
        out: &mut W,
    ) -> anyhow::Result<(String, StreamStats)> {
        if let Err(e) = self.print_header(query, status, out) {
            mark_failed(status.fail(out, FAILED_TEXT));
            return Err(e.into());
        }

        let mut renderer = StreamRenderer::start(out, self.style, GENERATING_TEXT)?;
        match self.consume(query, &mut renderer).await {
            Ok(response) => {
                renderer.succeed(COMPLETED_TEXT)?;
                Ok((response, renderer.stats()))
            }
            Err(e) => {
                mark_failed(renderer.fail(FAILED_TEXT));
                Err(e)
            }
        }
    }

    fn print_header<W: Write>(
        &self,
        query: &Query,
        status: &mut StatusLine,
        out: &mut W,
    ) -> std::io::Result<()> {
        status.stop(out)?;
        writeln!(out)?;
        writeln!(out, "{} {}", self.style.blue("📝 Query:"), query)?;
        writeln!(out, "{}", self.style.green("✨ Response:"))?;
        writeln!(out)?;
        out.flush()
    }

    /// Feed every backend event to the renderer, returning the final text.
    async fn consume<W: Write>(
        &self,
        query: &Query,
        renderer: &mut StreamRenderer<'_, W>,
    ) -> anyhow::Result<String> {
        debug!(
            "Streaming from {} ({})",
            self.backend.name(),
            self.backend.model()
        );
        let mut events = self.backend.stream(query.as_str()).await?;
        let mut rendered = String::new();

        while let Some(event) = events.next().await {
            match event? {
                StreamEvent::Fragment(fragment) => {
                    renderer.on_fragment(&fragment)?;
                    rendered.push_str(&fragment);
                }
                StreamEvent::Completed(full) => {
                    if full != rendered {
                        debug!("Final response differs from rendered fragments");
                    }
                    return Ok(full);
                }
            }
        }

        debug!("Stream ended without a completion event");
        Ok(rendered)
    }

    fn print_summary<W: Write>(
        &self,
        out: &mut W,
        stats: &StreamStats,
        elapsed: Duration,
        finished_at: chrono::DateTime<Local>,
    ) -> std::io::Result<()> {
        let completed = format!(
            "⏰ Completed at: {} ({:.1}s)",
            finished_at.format("%H:%M:%S"),
            elapsed.as_secs_f64()
        );
        writeln!(out, "{}", self.style.gray(&completed))?;
        writeln!(out, "{}", self.style.dim(&format!("📊 {}", stats.summary_text())))?;
        writeln!(out)?;
        out.flush()
    }

    fn advance(&self, phase: &mut QueryPhase, next: QueryPhase) {
        debug!("Query phase: {} -> {}", phase, next);
        *phase = next;
    }
}

/// The query error is what the caller sees; a failure line that could not be
/// written is only logged.
fn mark_failed(result: std::io::Result<()>) {
    if let Err(e) = result {
        warn!("Could not mark status line failed: {}", e);
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
