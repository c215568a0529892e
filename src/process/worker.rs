//! Worker units and their supervisor.
//!
//! A unit is a task looping over receive, process, send. Units share the
//! channel and the server; they are independent otherwise. The supervisor
//! owns the unit handles, replaces units that failed and bounds the drain.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::Channel;
use crate::error::Result;
use crate::server::ComponentServer;

/// Receive, process and reply until cancelled or the channel closes.
///
/// Cancellation is only observed while waiting for a request; a request
/// being processed always gets its reply.
pub(crate) async fn unit_loop<C: Channel>(
    id: usize,
    channel: Arc<C>,
    server: Arc<ComponentServer>,
    token: CancellationToken,
) -> Result<()> {
    tracing::debug!("Unit {} started", id);
    loop {
        let received = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!("Unit {} stopped", id);
                return Ok(());
            }
            received = channel.recv() => received?,
        };

        let Some(request) = received else {
            tracing::debug!("Unit {} finished, channel closed", id);
            return Ok(());
        };

        let reply = server.process(request).await?;
        channel.send(reply).await?;
    }
}

enum UnitState {
    Running(JoinHandle<Result<()>>),
    Finished,
}

struct Unit {
    id: usize,
    state: UnitState,
}

/// Owns the units of a process.
pub(crate) struct Supervisor<C: Channel> {
    channel: Arc<C>,
    server: Arc<ComponentServer>,
    token: CancellationToken,
    units: Vec<Unit>,
    next_id: usize,
    restarts: usize,
}

impl<C: Channel> Supervisor<C> {
    pub(crate) fn new(channel: Arc<C>, server: Arc<ComponentServer>, token: CancellationToken) -> Self {
        Self {
            channel,
            server,
            token,
            units: Vec::new(),
            next_id: 0,
            restarts: 0,
        }
    }

    /// Spawn `count` new units.
    pub(crate) fn spawn_units(&mut self, count: usize) {
        for _ in 0..count {
            let unit = self.spawn();
            self.units.push(unit);
        }
    }

    fn spawn(&mut self) -> Unit {
        let id = self.next_id;
        self.next_id += 1;
        let handle = tokio::spawn(unit_loop(
            id,
            Arc::clone(&self.channel),
            Arc::clone(&self.server),
            self.token.clone(),
        ));
        Unit {
            id,
            state: UnitState::Running(handle),
        }
    }

    /// Replace a finished unit by a fresh one.
    ///
    /// A unit that is still running is left alone.
    pub(crate) fn restart_unit(&mut self, index: usize) {
        let Some(unit) = self.units.get(index) else {
            return;
        };
        if matches!(unit.state, UnitState::Running(ref handle) if !handle.is_finished()) {
            tracing::error!("Unit {} is still running, not restarting it", unit.id);
            return;
        }
        let old_id = unit.id;
        let unit = self.spawn();
        tracing::info!("Unit {} replaced by unit {}", old_id, unit.id);
        self.units[index] = unit;
        self.restarts += 1;
    }

    /// Collect finished units, restarting the ones that failed.
    pub(crate) async fn supervise(&mut self) {
        let mut failed = Vec::new();
        for (index, unit) in self.units.iter_mut().enumerate() {
            let UnitState::Running(handle) = &mut unit.state else {
                continue;
            };
            if !handle.is_finished() {
                continue;
            }

            match handle.await {
                Ok(Ok(())) => unit.state = UnitState::Finished,
                Ok(Err(e)) => {
                    tracing::error!("Unit {} failed: {}", unit.id, e);
                    failed.push(index);
                }
                Err(e) => {
                    tracing::error!("Unit {} crashed: {}", unit.id, e);
                    failed.push(index);
                }
            }
        }

        for index in failed {
            self.restart_unit(index);
        }
    }

    /// Whether every unit finished normally.
    pub(crate) fn all_finished(&self) -> bool {
        self.units
            .iter()
            .all(|unit| matches!(unit.state, UnitState::Finished))
    }

    pub(crate) fn restarts(&self) -> usize {
        self.restarts
    }

    /// Cancel all units and wait up to `timeout` for them.
    ///
    /// Returns the number of units abandoned.
    pub(crate) async fn drain(&mut self, timeout: Duration) -> usize {
        self.token.cancel();

        let mut handles: Vec<(usize, JoinHandle<Result<()>>)> = self
            .units
            .drain(..)
            .filter_map(|unit| match unit.state {
                UnitState::Running(handle) => Some((unit.id, handle)),
                UnitState::Finished => None,
            })
            .collect();

        let wait_all = futures::future::join_all(handles.iter_mut().map(|(_, handle)| handle));
        if tokio::time::timeout(timeout, wait_all).await.is_ok() {
            return 0;
        }

        let mut abandoned = 0;
        for (id, handle) in &handles {
            if !handle.is_finished() {
                tracing::warn!("Unit {} did not stop in time, abandoning it", id);
                handle.abort();
                abandoned += 1;
            }
        }
        abandoned
    }
}
