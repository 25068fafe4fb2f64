use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::engine::Engine;
use crate::error::HubResult;
use crate::hub::client::HubClient;

/// Keeps an event stream to the hub open and feeds every frame to the
/// [`Engine`]. Connection failures are never fatal: the listener waits a
/// fixed delay and reconnects, forever, until stopped.
pub struct HubListener {
    client: HubClient,
    engine: Arc<Engine>,
    reconnect_delay: Duration,
    cancel: CancellationToken,
}

/// Handle to a spawned [`HubListener`].
pub struct ListenerHandle {
    engine: Arc<Engine>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl HubListener {
    pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);

    #[must_use]
    pub fn new(client: HubClient, engine: Arc<Engine>) -> Self {
        Self {
            client,
            engine,
            reconnect_delay: Self::DEFAULT_RECONNECT_DELAY,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub async fn run(&self) {
        loop {
            match self.listen().await {
                Ok(()) => log::debug!("Listener connection complete"),
                Err(err) => log::error!("Error in hub event listener: {err}"),
            }

            if self.cancel.is_cancelled() {
                break;
            }

            log::warn!(
                "Hub event stream ended, will sleep {}s before retrying",
                self.reconnect_delay.as_secs_f32()
            );
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = sleep(self.reconnect_delay) => {}
            }
        }
        log::debug!("Listener loop exited");
    }

    async fn listen(&self) -> HubResult<()> {
        let mut stream = tokio::select! {
            () = self.cancel.cancelled() => return Ok(()),
            res = self.client.connect() => res?,
        };

        loop {
            let next = tokio::select! {
                () = self.cancel.cancelled() => None,
                msg = stream.next_text() => Some(msg),
            };

            let Some(msg) = next else {
                stream.close().await;
                return Ok(());
            };

            match msg? {
                Some(text) => self.engine.handle_text(&text),
                None => return Ok(()),
            }
        }
    }

    /// Run the listener on its own task.
    #[must_use]
    pub fn spawn(self) -> ListenerHandle {
        let engine = self.engine.clone();
        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move { self.run().await });
        ListenerHandle {
            engine,
            cancel,
            task,
        }
    }
}

impl ListenerHandle {
    /// Close the active connection, wait for the listener task to exit, then
    /// clear the device registry.
    pub async fn stop(self) -> HubResult<()> {
        log::info!("Listener request for stop..");
        self.cancel.cancel();
        let joined = self.task.await;
        self.engine.clear();
        log::info!("Listener stopped..");
        Ok(joined?)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
