#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use jobwatch_client::clock::ManualClock;
use jobwatch_client::transport::{EventSource, FrameStream, OpenError, TransportError};
use jobwatch_client::{ClientConfig, ConnectionState, ProgressClient};
use jobwatch_core::progress::{ActiveJob, ProgressNode};
use jobwatch_events::{PushEvent, SseFrame};

/// What the next `open` call does.
pub enum OpenScript {
    Stream(mpsc::UnboundedReceiver<Result<SseFrame, TransportError>>),
    Unauthorized,
    Status(u16),
    /// Never resolves.
    Hang,
}

/// Server side of a scripted stream.
pub struct StreamHandle {
    tx: mpsc::UnboundedSender<Result<SseFrame, TransportError>>,
}

impl StreamHandle {
    pub fn send(&self, event: PushEvent) {
        let frame = SseFrame {
            event: Some(event.kind.as_str().to_string()),
            data: event.data.to_string(),
            id: None,
        };
        let _ = self.tx.send(Ok(frame));
    }

    pub fn send_update(&self, node: &ProgressNode) {
        self.send(PushEvent::update(node).unwrap());
    }

    pub fn send_raw(&self, event: &str, data: &str) {
        let _ = self.tx.send(Ok(SseFrame {
            event: Some(event.to_string()),
            data: data.to_string(),
            id: None,
        }));
    }

    /// Server closes the connection.
    pub fn close(self) {}
}

/// Event source that replays queued scripts, one per `open`.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<VecDeque<OpenScript>>,
    active: Mutex<Vec<ActiveJob>>,
    opens: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a successful open and return the handle that feeds it.
    pub fn push_stream(&self) -> StreamHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(OpenScript::Stream(rx));
        StreamHandle { tx }
    }

    pub fn push(&self, script: OpenScript) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn set_active(&self, jobs: Vec<ActiveJob>) {
        *self.active.lock().unwrap() = jobs;
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn open(&self, _credential: &str) -> Result<FrameStream, OpenError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(OpenScript::Stream(rx)) => Ok(UnboundedReceiverStream::new(rx).boxed()),
            Some(OpenScript::Unauthorized) => Err(OpenError::Unauthorized),
            Some(OpenScript::Status(code)) => Err(OpenError::Status(code)),
            Some(OpenScript::Hang) => std::future::pending().await,
            None => Err(OpenError::Transport("no script queued".into())),
        }
    }

    async fn fetch_active(&self, _credential: &str) -> Result<Vec<ActiveJob>, TransportError> {
        Ok(self.active.lock().unwrap().clone())
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        hydrate_on_connect: false,
        ..ClientConfig::new("http://jobwatch.test", "test-token")
    }
}

pub fn client_with(
    config: ClientConfig,
    source: &Arc<ScriptedSource>,
) -> (ProgressClient, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let client = ProgressClient::with_clock(config, source.clone(), clock.clone());
    (client, clock)
}

/// Let spawned tasks run until they block. Advances paused time by 1 ms.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub async fn wait_for_state(client: &ProgressClient, target: ConnectionState) {
    let mut rx = client.watch_state();
    tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| *s == target))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {target}"))
        .expect("state channel closed");
}

pub fn now() -> chrono::DateTime<Utc> {
    Utc::now()
}
