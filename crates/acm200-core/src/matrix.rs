// ── Matrix facade ──
//
// Per-device owner: one configuration, one `DeviceClient`, one poller and
// at most one background poll task. Cheaply cloneable via `Arc`.

use std::future::Future;
use std::sync::Arc;

use acm200_api::{DeviceClient, SwitchReceipt, TcpTransport, Transport};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::MatrixConfig;
use crate::error::CoreError;
use crate::model::{DeviceInfo, InputLabels, Route, RoutingSnapshot, output_name};
use crate::poller::{PollPhase, RoutingPoller};
use crate::sink::{PollStatus, RouteSink};

// ── RoutingControl ───────────────────────────────────────────────

/// What a presentation layer needs from a matrix: apply a route and read
/// the latest routing state.
pub trait RoutingControl: Send + Sync {
    fn apply(&self, route: Route) -> impl Future<Output = Result<SwitchReceipt, CoreError>> + Send;

    fn snapshot(&self) -> Option<Arc<RoutingSnapshot>>;
}

// ── Matrix ───────────────────────────────────────────────────────

pub struct Matrix<T = TcpTransport> {
    inner: Arc<MatrixInner<T>>,
}

impl<T> Clone for Matrix<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct MatrixInner<T> {
    config: MatrixConfig,
    client: Arc<DeviceClient<T>>,
    poller: RoutingPoller<T>,
    labels: InputLabels,
    status: watch::Sender<PollStatus>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Matrix<TcpTransport> {
    /// Validate `config` and build the TCP client for it. Does not touch
    /// the network; call [`start()`](Self::start) to begin polling.
    pub fn new(config: MatrixConfig) -> Result<Self, CoreError> {
        let address = config.address()?;
        let transport = TcpTransport::new(address, config.transport.clone());
        Self::with_transport(config, transport)
    }

    /// Build a matrix, run `f` against it without background polling, then
    /// shut it down.
    pub async fn oneshot<F, Fut, R>(config: MatrixConfig, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(Matrix) -> Fut,
        Fut: Future<Output = Result<R, CoreError>>,
    {
        let matrix = Self::new(config)?;
        let result = f(matrix.clone()).await;
        matrix.shutdown().await;
        result
    }
}

impl<T: Transport + 'static> Matrix<T> {
    /// Build a matrix over a caller-supplied transport.
    pub fn with_transport(config: MatrixConfig, transport: T) -> Result<Self, CoreError> {
        config.validate()?;
        let address = config.address()?;
        let client = Arc::new(DeviceClient::with_transport(address, transport));
        let poller = RoutingPoller::new(
            Arc::clone(&client),
            config.num_outputs,
            config.effective_poll_interval(),
        );
        let labels = InputLabels::new(config.num_inputs, &config.input_names);
        let (status, _) = watch::channel(PollStatus::Pending);

        Ok(Self {
            inner: Arc::new(MatrixInner {
                config,
                client,
                poller,
                labels,
                status,
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &MatrixConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &DeviceClient<T> {
        &self.inner.client
    }

    pub fn labels(&self) -> &InputLabels {
        &self.inner.labels
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo::from_config(&self.inner.config)
    }

    /// Display name for `output`.
    pub fn output_name(&self, output: u16) -> String {
        output_name(output, &self.inner.config.output_names)
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the background poll task. The first cycle runs immediately.
    /// Calling this while a task is running does nothing.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Shutdown);
        }

        let mut task = self.inner.task.lock().await;
        if task.is_some() {
            debug!("poll task already running");
            return Ok(());
        }

        let matrix = self.clone();
        let cancel = self.inner.cancel.clone();
        *task = Some(tokio::spawn(async move {
            matrix.inner.poller.run(&matrix.inner.status, cancel).await;
        }));
        info!(address = %self.inner.client.address(), "matrix polling started");
        Ok(())
    }

    /// Stop polling, abandon any in-flight device call and wait for the
    /// poll task to exit. Every later device operation fails with
    /// [`CoreError::Shutdown`].
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.client.shutdown();

        let handle = self.inner.task.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        debug!(address = %self.inner.client.address(), "matrix shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    // ── State observation ────────────────────────────────────────

    /// Latest successful snapshot, `None` before the first cycle or after
    /// a failed one.
    pub fn snapshot(&self) -> Option<Arc<RoutingSnapshot>> {
        self.inner.status.borrow().snapshot().cloned()
    }

    pub fn status(&self) -> PollStatus {
        self.inner.status.borrow().clone()
    }

    /// Subscribe to poll outcomes.
    pub fn subscribe(&self) -> watch::Receiver<PollStatus> {
        self.inner.status.subscribe()
    }

    /// Poll outcomes as a `Stream`, starting with the current one.
    pub fn updates(&self) -> WatchStream<PollStatus> {
        WatchStream::new(self.subscribe())
    }

    pub fn phase(&self) -> watch::Receiver<PollPhase> {
        self.inner.poller.phase()
    }

    // ── Polling on demand ────────────────────────────────────────

    /// Run one poll cycle now and publish its result.
    pub async fn refresh(&self) -> Result<Arc<RoutingSnapshot>, CoreError> {
        match self.inner.poller.poll_once().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.inner.status.publish(Arc::clone(&snapshot));
                Ok(snapshot)
            }
            Err(e) => {
                if !matches!(e, CoreError::Shutdown) {
                    self.inner.status.update_failed(&e);
                }
                Err(e)
            }
        }
    }

    // ── Routing ──────────────────────────────────────────────────

    /// Route `output` to `input` after checking both against the
    /// configured counts.
    pub async fn switch_route(&self, output: u16, input: u16) -> Result<SwitchReceipt, CoreError> {
        self.check_output(output)?;
        check_id("input", input, self.inner.config.num_inputs)?;
        Ok(self.inner.client.switch_route(output, input).await?)
    }

    /// Route `output` to the input carrying source label `label`.
    pub async fn select_source(&self, output: u16, label: &str) -> Result<SwitchReceipt, CoreError> {
        self.check_output(output)?;
        let input = self
            .inner
            .labels
            .input_for(label)
            .ok_or_else(|| CoreError::UnknownSource {
                output,
                label: label.to_owned(),
            })?;
        self.switch_route(output, input).await
    }

    /// Ask the device which input feeds `output`.
    pub async fn get_route(&self, output: u16) -> Result<Option<u16>, CoreError> {
        self.check_output(output)?;
        Ok(self.inner.client.get_route(output).await?)
    }

    fn check_output(&self, output: u16) -> Result<(), CoreError> {
        check_id("output", output, self.inner.config.num_outputs)
    }
}

fn check_id(kind: &str, id: u16, count: u16) -> Result<(), CoreError> {
    if id == 0 || id > count {
        return Err(CoreError::InvalidArgument {
            message: format!("{kind} {id} is outside 1..={count}"),
        });
    }
    Ok(())
}

impl<T: Transport + 'static> RoutingControl for Matrix<T> {
    fn apply(&self, route: Route) -> impl Future<Output = Result<SwitchReceipt, CoreError>> + Send {
        self.switch_route(route.output, route.input)
    }

    fn snapshot(&self) -> Option<Arc<RoutingSnapshot>> {
        Matrix::snapshot(self)
    }
}
