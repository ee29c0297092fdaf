//! Consumer side of a session

use crate::error::{Error, Result};
use crate::event::{SessionOutcome, StreamEvent};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Ordered stream of session events.
///
/// Ends after the final `Complete` (or last `Delta`). A non-zero exit that
/// nothing else explains is yielded as a trailing `Err`. Dropping the stream
/// cancels the session.
pub struct EventStream {
    session_id: String,
    rx: mpsc::Receiver<StreamEvent>,
    driver: Option<JoinHandle<Result<SessionOutcome>>>,
    outcome: Option<SessionOutcome>,
    done: bool,
}

impl EventStream {
    pub(crate) fn new(
        session_id: String,
        rx: mpsc::Receiver<StreamEvent>,
        driver: JoinHandle<Result<SessionOutcome>>,
    ) -> Self {
        Self {
            session_id,
            rx,
            driver: Some(driver),
            outcome: None,
            done: false,
        }
    }

    /// Session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Summary of the finished session, available once the stream ended.
    #[must_use]
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    /// Drive the stream to the end, concatenating `Delta` and `Complete`
    /// content in order.
    pub async fn collect_content(mut self) -> Result<(String, SessionOutcome)> {
        use futures::StreamExt;

        let mut content = String::new();
        while let Some(event) = self.next().await {
            if let Some(text) = event?.content() {
                content.push_str(text);
            }
        }
        let outcome = self.outcome.take().ok_or_else(|| {
            Error::Processing("session ended without an outcome".to_string())
        })?;
        Ok((content, outcome))
    }
}

impl Stream for EventStream {
    type Item = Result<StreamEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => return Poll::Ready(Some(Ok(event))),
            Poll::Pending => return Poll::Pending,
            // Sender dropped: the driver is finishing
            Poll::Ready(None) => {}
        }

        let Some(driver) = this.driver.as_mut() else {
            this.done = true;
            return Poll::Ready(None);
        };
        let joined = ready!(Pin::new(driver).poll(cx));
        this.driver = None;
        this.done = true;

        match joined {
            Ok(Ok(outcome)) => {
                let failure = outcome.is_exit_failure().then(|| Error::ProcessExit {
                    code: outcome.exit_code.unwrap_or(-1),
                });
                this.outcome = Some(outcome);
                Poll::Ready(failure.map(Err))
            }
            Ok(Err(e)) => Poll::Ready(Some(Err(e))),
            Err(e) => Poll::Ready(Some(Err(Error::Processing(format!(
                "session driver failed: {}",
                e
            ))))),
        }
    }
}
