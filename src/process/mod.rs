//! Component process: runtime, worker units, supervision and drain.
//!
//! # Lifecycle
//!
//! ```text
//! Starting ──► Running ──► Draining ──► Stopped
//!   on_start     supervise     cancel units    on_stop
//!   spawn units  restart       wait/abandon
//! ```
//!
//! [`ComponentProcess::run`] builds a single-threaded runtime, serves the
//! stdio channel and drains on SIGTERM. [`ComponentProcess::serve`] runs
//! the same lifecycle on any [`Channel`] inside an existing runtime.
//!
//! # Example
//!
//! ```no_run
//! use svc_runtime::component::{Component, ComponentConfig};
//!
//! fn main() -> svc_runtime::Result<()> {
//!     Component::builder(ComponentConfig::new("users", "1.0.0"))
//!         .action("read", |action| async move { Ok(action) })
//!         .into_process()?
//!         .run()
//! }
//! ```

mod signals;
mod worker;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub use signals::terminate_signal;

use crate::channel::{Channel, PipeChannel};
use crate::component::Component;
use crate::error::Result;
use crate::server::ComponentServer;
use worker::Supervisor;

/// Observable state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Starting,
    Running,
    Draining,
    Stopped,
}

/// A component running as a supervised set of worker units.
pub struct ComponentProcess {
    component: Component,
    state: watch::Sender<ProcessState>,
}

impl ComponentProcess {
    pub fn new(component: Component) -> Self {
        let (state, _) = watch::channel(ProcessState::Starting);
        Self { component, state }
    }

    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.state.subscribe()
    }

    /// Serve stdin/stdout until SIGTERM or until the channel closes.
    pub fn run(self) -> Result<()> {
        let config = self.component.config().channel_config();
        self.run_with(move || PipeChannel::stdio(config))
    }

    /// Serve the channel built by `connect` until SIGTERM or until it closes.
    ///
    /// `connect` runs inside the runtime, so it may spawn tasks. Installs
    /// the stderr logger unless one is already set.
    pub fn run_with<C, F>(self, connect: F) -> Result<()>
    where
        C: Channel,
        F: FnOnce() -> C,
    {
        self.run_until(connect, terminate_signal)
    }

    /// Like [`run_with`](Self::run_with), draining when the future built by
    /// `shutdown` resolves.
    ///
    /// `shutdown` is built inside the runtime before any unit starts, so a
    /// signal that arrives while units start up is not lost.
    pub fn run_until<C, F, S, Fut>(self, connect: F, shutdown: S) -> Result<()>
    where
        C: Channel,
        F: FnOnce() -> C,
        S: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        crate::logging::init_logging(self.component.config().debug);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let result = runtime.block_on(async move {
            let shutdown = shutdown();
            let channel = connect();
            self.serve(channel, shutdown).await
        });

        // Abandoned units must not hold the process open.
        runtime.shutdown_background();
        result
    }

    /// Run the full lifecycle on `channel` until `shutdown` resolves or
    /// every unit has finished.
    pub async fn serve<C, S>(self, channel: C, shutdown: S) -> Result<()>
    where
        C: Channel,
        S: Future<Output = ()>,
    {
        let context = Arc::clone(self.component.context());
        let config = context.config().clone();

        self.set_state(ProcessState::Starting);
        self.component.hooks().started(&context);

        let server = Arc::new(ComponentServer::new(self.component.clone()));
        let channel = Arc::new(channel);
        let mut supervisor = Supervisor::new(Arc::clone(&channel), server, CancellationToken::new());
        supervisor.spawn_units(config.workers);

        self.set_state(ProcessState::Running);
        tracing::info!(
            "Component {} ({}) running with {} unit(s)",
            config.name,
            config.version,
            config.workers
        );

        let mut interval = tokio::time::interval(config.supervise_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                _ = interval.tick() => {
                    supervisor.supervise().await;
                    if supervisor.all_finished() {
                        tracing::info!("Channel closed, all units finished");
                        break;
                    }
                }
            }
        }

        self.set_state(ProcessState::Draining);
        let drain_started = Instant::now();
        let abandoned = supervisor.drain(config.drain_timeout()).await;
        if abandoned > 0 {
            tracing::warn!("{} unit(s) abandoned after drain timeout", abandoned);
        }

        // Replies queued by the last units share what is left of the budget.
        let remaining = config.drain_timeout().saturating_sub(drain_started.elapsed());
        match tokio::time::timeout(remaining, channel.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to flush pending replies: {}", e),
            Err(_) => tracing::warn!("Pending replies not flushed before drain timeout"),
        }

        self.component.hooks().stopped(&context);
        self.set_state(ProcessState::Stopped);
        tracing::info!(
            "Component {} ({}) stopped after {} restart(s)",
            config.name,
            config.version,
            supervisor.restarts()
        );
        Ok(())
    }

    fn set_state(&self, state: ProcessState) {
        tracing::debug!("Process state: {:?}", state);
        self.state.send_replace(state);
    }
}
