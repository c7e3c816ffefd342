//! Merged output/exit event stream for a spawned child.
//!
//! Turns a [`tokio::process::Child`] into a single ordered stream of line
//! and exit events. Both stdio pipes are drained to EOF before the exit
//! event is emitted, so buffered output is always applied to the status
//! record before the terminal transition, the best-effort flush the
//! lifecycle relies on.

use std::pin::Pin;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// Which pipe a line arrived on. Informational only: severity is decided
/// by line content, not by stream, since the automation frameworks log
/// progress to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

/// One event observed from the tracked child.
#[derive(Debug)]
pub enum ChildEvent {
    /// A line of output, in transport delivery order per pipe.
    Line { source: StreamSource, text: String },

    /// The child terminated. `code` is `None` for signal-terminated
    /// processes. Always the final event.
    Exited { code: Option<i32> },
}

/// Observe a spawned child as a stream of [`ChildEvent`]s.
///
/// Each pipe is read line by line on its own task; the merged channel
/// closes when both hit EOF, and only then is the child reaped and the
/// exit event yielded.
pub fn observe(mut child: Child) -> Pin<Box<dyn Stream<Item = ChildEvent> + Send>> {
    let stream = async_stream::stream! {
        let (tx, mut rx) = mpsc::channel::<ChildEvent>(64);

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(read_lines(stdout, StreamSource::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(read_lines(stderr, StreamSource::Stderr, tx.clone()));
        }
        drop(tx);

        while let Some(event) = rx.recv().await {
            yield event;
        }

        let code = match child.wait().await {
            Ok(status) => status.code(),
            Err(_) => None,
        };
        yield ChildEvent::Exited { code };
    };

    Box::pin(stream)
}

async fn read_lines<R>(pipe: R, source: StreamSource, tx: mpsc::Sender<ChildEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(pipe).lines();
    while let Ok(Some(text)) = lines.next_line().await {
        if text.trim().is_empty() {
            continue;
        }
        if tx.send(ChildEvent::Line { source, text }).await.is_err() {
            return;
        }
    }
}
