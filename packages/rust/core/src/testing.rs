//! Scripted collaborators shared by the unit tests in this crate.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pagedigest_llm::CompletionProvider;
use pagedigest_shared::{PageDigestError, Result, SummaryRequest};

use crate::report::{PipelineEvent, PipelineReporter};

type Responder = Box<dyn Fn(&str, usize) -> Result<String> + Send + Sync>;
type Latency = Box<dyn Fn(&str) -> Duration + Send + Sync>;

/// A provider whose answers and latency are computed from the prompt.
///
/// The responder receives the prompt and how many times that exact prompt
/// has been seen before (0 on the first call).
pub(crate) struct ScriptedProvider {
    responder: Responder,
    latency: Latency,
    calls: Mutex<Vec<String>>,
    seen: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn new(
        responder: impl Fn(&str, usize) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            latency: Box::new(|_| Duration::ZERO),
            calls: Mutex::new(Vec::new()),
            seen: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Echo provider: answers `facts:<prompt>`.
    pub(crate) fn echo() -> Self {
        Self::new(|prompt, _| Ok(format!("facts:{prompt}")))
    }

    /// Always answers with `text`.
    pub(crate) fn constant(text: &'static str) -> Self {
        Self::new(move |_, _| Ok(text.to_string()))
    }

    /// Fails every prompt containing `needle` with the given HTTP status.
    pub(crate) fn failing_on(needle: &'static str, status: u16) -> Self {
        Self::new(move |prompt, _| {
            if prompt.contains(needle) {
                Err(PageDigestError::provider(Some(status), format!("refused {needle}")))
            } else {
                Ok(format!("facts:{prompt}"))
            }
        })
    }

    pub(crate) fn with_latency(
        mut self,
        latency: impl Fn(&str) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.latency = Box::new(latency);
        self
    }

    /// Prompts in the order calls were made.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, _request: &SummaryRequest, prompt: &str) -> Result<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(prompt.to_string());

        let delay = (self.latency)(prompt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let seen = {
            let mut seen = self.seen.lock().unwrap();
            let count = seen.entry(prompt.to_string()).or_insert(0);
            let before = *count;
            *count += 1;
            before
        };
        (self.responder)(prompt, seen)
    }
}

/// Records every event as its display string.
#[derive(Default)]
pub(crate) struct RecordingReporter {
    events: Mutex<Vec<String>>,
    windows: Mutex<Vec<usize>>,
}

impl RecordingReporter {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Sizes of the dispatch windows, in start order.
    pub(crate) fn window_sizes(&self) -> Vec<usize> {
        self.windows.lock().unwrap().clone()
    }
}

impl PipelineReporter for RecordingReporter {
    fn event(&self, event: &PipelineEvent<'_>) {
        if let PipelineEvent::WindowStarted { size, .. } = event {
            self.windows.lock().unwrap().push(*size);
        }
        self.events.lock().unwrap().push(event.to_string());
    }
}

/// Request parameters used throughout the tests.
pub(crate) fn test_request(prompt: &str) -> SummaryRequest {
    SummaryRequest {
        model: "test-model".into(),
        max_tokens: 256,
        temperature: 0.5,
        top_p: None,
        frequency_penalty: None,
        presence_penalty: None,
        prompt: prompt.into(),
    }
}

/// Log output captured from a scoped `tracing` subscriber.
#[derive(Clone, Default)]
pub(crate) struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Route debug-level logs on this thread into a buffer until the guard drops.
pub(crate) fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}
