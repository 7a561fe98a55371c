//! Fluent builder for constructing a [`Simulator`].

use std::sync::Arc;

use crate::{
    AsFastAsPossible, ExecutionLoop, ExecutionMode, RealTime, Replication, SimConfig, SimListener,
    SimResult, Simulator,
};

/// Fluent builder for [`Simulator`].
///
/// # Optional inputs (have defaults)
///
/// | Method                 | Default                                   |
/// |------------------------|-------------------------------------------|
/// | `.listener(l)`         | No listeners                              |
/// | `.execution_loop(e)`   | Chosen by `SimConfig::mode`               |
/// | `.replication(r)`      | None; call `Simulator::initialize` later  |
///
/// # Example
///
/// ```rust,ignore
/// let replication = Arc::new(Replication::new(
///     ReplicationId::from(0),
///     SimTime(0.0),
///     SimDuration::ZERO,
///     SimDuration(3_600.0),
/// )?);
/// let sim = SimulatorBuilder::new(SimConfig::default())
///     .listener(Arc::new(ProgressPrinter))
///     .replication(replication)
///     .build()?;
/// sim.run()?;
/// ```
pub struct SimulatorBuilder {
    config:      SimConfig,
    listeners:   Vec<Arc<dyn SimListener>>,
    exec:        Option<Box<dyn ExecutionLoop>>,
    replication: Option<Arc<Replication>>,
}

impl SimulatorBuilder {
    pub fn new(config: SimConfig) -> Self {
        Self { config, listeners: Vec::new(), exec: None, replication: None }
    }

    pub fn listener(mut self, listener: Arc<dyn SimListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Replace the execution loop selected by `SimConfig::mode`.
    pub fn execution_loop(mut self, exec: Box<dyn ExecutionLoop>) -> Self {
        self.exec = Some(exec);
        self
    }

    /// Initialize the simulator with `replication` as part of `build`.
    pub fn replication(mut self, replication: Arc<Replication>) -> Self {
        self.replication = Some(replication);
        self
    }

    /// Validate the configuration, create the worker pool (if any) and
    /// return the simulator.
    pub fn build(self) -> SimResult<Simulator> {
        let exec = self.exec.unwrap_or_else(|| match self.config.mode {
            ExecutionMode::AsFastAsPossible => Box::new(AsFastAsPossible),
            ExecutionMode::RealTime => Box::new(RealTime),
        });
        let sim = Simulator::from_parts(self.config, exec, self.listeners)?;
        if let Some(replication) = self.replication {
            sim.initialize(replication)?;
        }
        Ok(sim)
    }
}

impl Simulator {
    /// A simulator with no listeners, not yet initialized.
    pub fn new(config: SimConfig) -> SimResult<Self> {
        SimulatorBuilder::new(config).build()
    }

    pub fn builder(config: SimConfig) -> SimulatorBuilder {
        SimulatorBuilder::new(config)
    }
}
