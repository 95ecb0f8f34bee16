//! Inference engine lifecycle controller.
//!
//! A single actor task owns the [`EngineState`], the live engine and every
//! pending timer. Callers talk to it through a [`ControllerHandle`]; all
//! transitions happen on the actor, one command at a time.
//!
//! ```text
//! Uninitialized → ProbingBackend ─┬─→ Failed(BackendUnavailable)      terminal
//!                                 └─→ Loading(v) ─┬─→ Ready(v)
//!                                                 └─→ Failed(LoadFailed)   no retry
//! Ready(v) ── device error/loss ─┬─→ Retrying → Loading(v), retry + 1
//!                                ├─→ Retrying → Loading(Fallback), retry = 0
//!                                └─→ Failed(DeviceLost)                 terminal
//! ```
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::{BackendError, DeviceSignal, EngineEvents, EngineHandle, InferenceBackend};
use crate::config::EngineConfig;
use crate::metrics::ControllerMetrics;
use crate::state::{EngineState, EngineStatus, FailureReason, ModelVariant};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// The engine is not ready; carries the last recorded failure.
    #[error("ENGINE/unavailable ({status}){}", reason_suffix(.reason))]
    Unavailable {
        status: EngineStatus,
        reason: Option<FailureReason>,
    },

    #[error("ENGINE/controller stopped")]
    Stopped,
}

fn reason_suffix(reason: &Option<FailureReason>) -> String {
    reason
        .as_ref()
        .map(|r| format!(": {}", r))
        .unwrap_or_default()
}

pub(crate) enum Command {
    Start,
    Restart,
    Reconfigure {
        variant: ModelVariant,
        retry_count: u32,
        /// Set when sent by a backoff timer
        timer_epoch: Option<u64>,
    },
    Loaded {
        generation: u64,
        result: Result<Box<dyn EngineHandle>, BackendError>,
    },
    Device {
        generation: u64,
        signal: DeviceSignal,
    },
    Stable {
        generation: u64,
    },
    Acquire(oneshot::Sender<Result<Arc<dyn EngineHandle>, ControllerError>>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable front end of one controller instance.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<EngineState>,
    metrics: ControllerMetrics,
}

impl ControllerHandle {
    /// Spawn the controller on the current tokio runtime and begin probing.
    pub fn start(
        backend: Arc<dyn InferenceBackend>,
        config: EngineConfig,
    ) -> Result<Self, prometheus::Error> {
        let metrics = ControllerMetrics::new()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(EngineState::default());

        let controller = Controller {
            backend,
            config,
            state: EngineState::default(),
            publisher: state_tx,
            self_tx: tx.downgrade(),
            metrics: metrics.clone(),
            engine: None,
            generation: 0,
            loading: None,
            queued: None,
            load_fault: None,
            timer: None,
            timer_epoch: 0,
            stability: None,
            shut_down: false,
        };
        tokio::spawn(controller.run(rx));

        let handle = Self {
            tx,
            state: state_rx,
            metrics,
        };
        // the actor holds the receiver, so this cannot fail
        let _ = handle.tx.send(Command::Start);
        Ok(handle)
    }

    pub fn state(&self) -> EngineState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.clone()
    }

    pub fn metrics(&self) -> &ControllerMetrics {
        &self.metrics
    }

    /// Reload with `variant`, recording `retry_count`. Cancels any pending timer.
    ///
    /// Switching to a different variant always resets the count to zero.
    pub fn reconfigure(&self, variant: ModelVariant, retry_count: u32) -> Result<(), ControllerError> {
        self.send(Command::Reconfigure {
            variant,
            retry_count,
            timer_epoch: None,
        })
    }

    /// Manual recovery: probe again and load the primary model with a clean count.
    pub fn restart(&self) -> Result<(), ControllerError> {
        self.send(Command::Restart)
    }

    /// The live engine, if the controller is `Ready`.
    pub async fn acquire(&self) -> Result<Arc<dyn EngineHandle>, ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Acquire(reply))?;
        rx.await.map_err(|_| ControllerError::Stopped)?
    }

    /// Wait until the state is `Ready` or a terminal `Failed`.
    pub async fn wait_settled(&self) -> Result<EngineState, ControllerError> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(EngineState::is_settled)
            .await
            .map_err(|_| ControllerError::Stopped)?;
        Ok((*state).clone())
    }

    /// Cancel timers, dispose the engine and stop the actor.
    pub async fn shutdown(&self) -> Result<(), ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Shutdown(reply))?;
        rx.await.map_err(|_| ControllerError::Stopped)
    }

    fn send(&self, command: Command) -> Result<(), ControllerError> {
        self.tx.send(command).map_err(|_| ControllerError::Stopped)
    }
}

/// Work deferred until the construction in flight settles.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Pending {
    Reload(ModelVariant, u32),
    Restart,
}

struct LiveEngine {
    generation: u64,
    handle: Arc<dyn EngineHandle>,
}

struct Controller {
    backend: Arc<dyn InferenceBackend>,
    config: EngineConfig,
    state: EngineState,
    publisher: watch::Sender<EngineState>,
    self_tx: mpsc::WeakUnboundedSender<Command>,
    metrics: ControllerMetrics,
    engine: Option<LiveEngine>,
    /// Bumped on every load attempt
    generation: u64,
    /// Generation of the construction in flight
    loading: Option<u64>,
    /// Reload or restart requested while a construction was in flight
    queued: Option<Pending>,
    /// Device failure reported by the construction in flight
    load_fault: Option<(u64, String)>,
    timer: Option<JoinHandle<()>>,
    timer_epoch: u64,
    stability: Option<JoinHandle<()>>,
    shut_down: bool,
}

impl Controller {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Start => self.start().await,
                Command::Restart => self.restart().await,
                Command::Reconfigure {
                    variant,
                    retry_count,
                    timer_epoch,
                } => {
                    if let Some(epoch) = timer_epoch {
                        if epoch != self.timer_epoch {
                            debug!(epoch, "ignoring superseded retry timer");
                            continue;
                        }
                        self.timer = None;
                    }
                    self.reconfigure(variant, retry_count).await;
                }
                Command::Loaded { generation, result } => self.on_loaded(generation, result).await,
                Command::Device { generation, signal } => self.on_device(generation, signal).await,
                Command::Stable { generation } => self.on_stable(generation),
                Command::Acquire(reply) => {
                    let _ = reply.send(self.acquire());
                }
                Command::Shutdown(reply) => {
                    self.teardown().await;
                    let _ = reply.send(());
                    return;
                }
            }
        }
        // every handle dropped
        self.teardown().await;
    }

    async fn start(&mut self) {
        if self.shut_down {
            return;
        }
        self.state.status = EngineStatus::ProbingBackend;
        self.publish();

        if !self.backend.probe().await {
            error!("acceleration backend unavailable; inference disabled");
            self.state.status = EngineStatus::Failed;
            self.state.last_failure = Some(FailureReason::BackendUnavailable);
            self.publish();
            return;
        }
        self.reconfigure(ModelVariant::Primary, 0).await;
    }

    async fn restart(&mut self) {
        info!("manual restart requested");
        self.cancel_timers();
        if self.loading.is_some() {
            self.state.variant = ModelVariant::Primary;
            self.state.retry_count = 0;
            self.queued = Some(Pending::Restart);
            return;
        }
        self.release().await;
        self.state.variant = ModelVariant::Primary;
        self.state.retry_count = 0;
        self.start().await;
    }

    /// Explicit reload entry point, used by the backoff timers.
    async fn reconfigure(&mut self, variant: ModelVariant, retry_count: u32) {
        if self.shut_down {
            return;
        }
        if self.state.status == EngineStatus::Failed
            && self.state.last_failure == Some(FailureReason::BackendUnavailable)
        {
            warn!("no acceleration backend; reload ignored until restart");
            return;
        }
        self.cancel_timers();
        // a variant change always starts a clean count
        let retry_count = if variant == self.state.variant {
            retry_count.min(self.config.max_retries)
        } else {
            0
        };
        self.state.variant = variant;
        self.state.retry_count = retry_count;

        if self.loading.is_some() {
            debug!(%variant, retry_count, "construction in flight; reload queued");
            self.queued = Some(Pending::Reload(variant, retry_count));
            return;
        }
        self.release().await;
        self.begin_load();
    }

    fn begin_load(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let variant = self.state.variant;
        let model_id = self.config.model_for(variant).to_string();

        self.loading = Some(generation);
        self.load_fault = None;
        self.state.status = EngineStatus::Loading;
        self.state.generation = generation;
        self.state.load_progress = None;
        self.metrics.load_attempts.inc();
        info!(%variant, model = %model_id, retry_count = self.state.retry_count, generation, "loading engine");
        self.publish();

        let backend = Arc::clone(&self.backend);
        let events = EngineEvents::new(generation, self.self_tx.clone());
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            let result = backend.create_engine(&model_id, events).await;
            let command = Command::Loaded { generation, result };
            let unsent = match tx.upgrade() {
                Some(tx) => tx.send(command).err().map(|e| e.0),
                None => Some(command),
            };
            // controller already gone: the new engine has no owner
            if let Some(Command::Loaded {
                result: Ok(engine), ..
            }) = unsent
            {
                dispose_quietly(engine.as_ref(), generation).await;
            }
        });
    }

    async fn on_loaded(&mut self, generation: u64, result: Result<Box<dyn EngineHandle>, BackendError>) {
        if self.loading != Some(generation) {
            warn!(generation, "discarding result of a superseded load");
            if let Ok(engine) = result {
                dispose_quietly(engine.as_ref(), generation).await;
            }
            return;
        }
        self.loading = None;

        if self.shut_down || self.queued.is_some() {
            debug!(generation, "discarding load superseded while in flight");
            if let Ok(engine) = result {
                dispose_quietly(engine.as_ref(), generation).await;
            }
            match self.queued.take() {
                _ if self.shut_down => {}
                Some(Pending::Reload(variant, retry_count)) => {
                    self.reconfigure(variant, retry_count).await;
                }
                Some(Pending::Restart) => self.start().await,
                None => {}
            }
            return;
        }

        // the device failed while the engine was still being built
        let result = match (result, self.load_fault.take()) {
            (Ok(engine), Some((fault_generation, message))) if fault_generation == generation => {
                dispose_quietly(engine.as_ref(), generation).await;
                Err(BackendError::Load(format!("device lost during load: {message}")))
            }
            (result, _) => result,
        };

        match result {
            Ok(engine) => {
                self.engine = Some(LiveEngine {
                    generation,
                    handle: Arc::from(engine),
                });
                self.state.status = EngineStatus::Ready;
                self.state.load_progress = None;
                info!(variant = %self.state.variant, retry_count = self.state.retry_count, generation, "engine ready");
                self.publish();
                self.schedule_stability(generation);
            }
            Err(err) => {
                self.metrics.load_failures.inc();
                error!(variant = %self.state.variant, generation, error = %err, "engine construction failed");
                self.state.status = EngineStatus::Failed;
                self.state.last_failure = Some(FailureReason::LoadFailed(err.to_string()));
                self.publish();
            }
        }
    }

    async fn on_device(&mut self, generation: u64, signal: DeviceSignal) {
        let message = match signal {
            DeviceSignal::Progress(fraction) => {
                if self.loading == Some(generation) {
                    self.state.load_progress = Some(fraction);
                    self.publish();
                }
                return;
            }
            DeviceSignal::DeviceError(message) | DeviceSignal::DeviceLost(message) => message,
        };

        if self.loading == Some(generation) {
            warn!(generation, %message, "device failed during engine construction");
            if self.load_fault.is_none() {
                self.load_fault = Some((generation, message));
            }
            return;
        }

        // first notification per loaded instance wins; later ones find no live engine
        let live = match self.engine.take() {
            Some(live) if live.generation == generation => live,
            other => {
                self.engine = other;
                debug!(generation, "ignoring device notification for a handled or replaced engine");
                return;
            }
        };

        self.metrics.device_losses.inc();
        self.cancel_stability();
        self.state.last_failure = Some(FailureReason::DeviceLost(message.clone()));
        let variant = self.state.variant;
        let retry_count = self.state.retry_count;
        let max = self.config.max_retries;
        warn!(%variant, retry_count, generation, %message, "engine device lost");
        dispose_quietly(live.handle.as_ref(), live.generation).await;

        if variant == ModelVariant::Primary && retry_count >= max {
            self.metrics.fallback_switches.inc();
            self.state.variant = ModelVariant::Fallback;
            self.state.retry_count = 0;
            self.state.status = EngineStatus::Retrying;
            info!(delay_ms = self.config.base_delay_ms, "primary retries exhausted; switching to fallback model");
            self.schedule_reload(self.config.base_delay(), ModelVariant::Fallback, 0);
        } else if retry_count < max {
            let delay = self.config.backoff(retry_count);
            self.state.status = EngineStatus::Retrying;
            info!(%variant, next_retry = retry_count + 1, delay_ms = delay.as_millis() as u64, "scheduling reload");
            self.schedule_reload(delay, variant, retry_count + 1);
        } else {
            error!(%variant, retry_count, "retries exhausted; inference disabled");
            self.state.status = EngineStatus::Failed;
        }
        self.publish();
    }

    fn on_stable(&mut self, generation: u64) {
        let healthy = self.state.is_ready()
            && self.engine.as_ref().map(|e| e.generation) == Some(generation);
        if healthy && self.state.retry_count != 0 {
            info!(generation, "engine stable; clearing retry count");
            self.state.retry_count = 0;
            self.publish();
        }
        self.stability = None;
    }

    fn acquire(&self) -> Result<Arc<dyn EngineHandle>, ControllerError> {
        match &self.engine {
            Some(live) if self.state.is_ready() => Ok(Arc::clone(&live.handle)),
            _ => Err(ControllerError::Unavailable {
                status: self.state.status,
                reason: self.state.last_failure.clone(),
            }),
        }
    }

    fn schedule_reload(&mut self, delay: Duration, variant: ModelVariant, retry_count: u32) {
        self.cancel_timers();
        self.timer_epoch += 1;
        let timer_epoch = self.timer_epoch;
        let tx = self.self_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::Reconfigure {
                    variant,
                    retry_count,
                    timer_epoch: Some(timer_epoch),
                });
            }
        }));
    }

    fn schedule_stability(&mut self, generation: u64) {
        self.cancel_stability();
        let window = self.config.stability_window();
        let tx = self.self_tx.clone();
        self.stability = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::Stable { generation });
            }
        }));
    }

    fn cancel_timers(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        // a timer that already fired carries a stale epoch
        self.timer_epoch += 1;
        self.cancel_stability();
    }

    fn cancel_stability(&mut self) {
        if let Some(timer) = self.stability.take() {
            timer.abort();
        }
    }

    /// Scoped release of the live engine; disposal errors are logged, never propagated.
    async fn release(&mut self) {
        if let Some(live) = self.engine.take() {
            dispose_quietly(live.handle.as_ref(), live.generation).await;
        }
    }

    async fn teardown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.cancel_timers();
        self.queued = None;
        self.load_fault = None;
        self.release().await;
        self.state.status = EngineStatus::Uninitialized;
        self.publish();
        info!("controller shut down");
    }

    fn publish(&self) {
        self.publisher.send_replace(self.state.clone());
    }
}

async fn dispose_quietly(engine: &dyn EngineHandle, generation: u64) {
    if let Err(err) = engine.dispose().await {
        warn!(generation, error = %err, "engine disposal failed");
    }
}
