//! Common test utilities for Conductor tests
//!
//! Scripted agents whose behaviour (failures, latency, hook failures) is set
//! up front, plus counters for observing how the engine drove them.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use serde_json::{json, Value};

use conductor::agents::{Agent, AgentError, AgentMetadata, AgentRegistry, Params, Result};

/// Observations shared between a scripted agent and the test body
#[derive(Debug, Default)]
pub struct Probe {
    pub validate_calls: AtomicUsize,
    pub execute_calls: AtomicUsize,
    pub initialize_calls: AtomicUsize,
    pub cleanup_calls: AtomicUsize,
    pub completed: AtomicUsize,
}

impl Probe {
    pub fn executes(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanup_calls.load(Ordering::SeqCst)
    }

    pub fn initializes(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn completions(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

/// Tracks how many agents run at the same time
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Agent whose behaviour is fixed at construction
pub struct ScriptedAgent {
    metadata: AgentMetadata,
    /// Number of leading attempts that fail
    fail_first: usize,
    /// Latency of every `execute`
    delay: Duration,
    valid: bool,
    panics: bool,
    fail_initialize: bool,
    probe: Arc<Probe>,
    gauge: Option<Arc<ConcurrencyGauge>>,
}

impl ScriptedAgent {
    pub fn new(name: &str) -> Self {
        Self {
            metadata: AgentMetadata::new(name, "test").with_retry(0, 0),
            fail_first: 0,
            delay: Duration::ZERO,
            valid: true,
            panics: false,
            fail_initialize: false,
            probe: Arc::new(Probe::default()),
            gauge: None,
        }
    }

    pub fn category(mut self, category: &str) -> Self {
        self.metadata.category = category.to_string();
        self
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.metadata = self.metadata.with_dependencies(deps.iter().copied());
        self
    }

    pub fn retries(mut self, count: u32) -> Self {
        self.metadata.retry_count = count;
        self
    }

    pub fn retry_delay_seconds(mut self, seconds: u64) -> Self {
        self.metadata.retry_delay_seconds = seconds;
        self
    }

    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.metadata.timeout_seconds = seconds;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_first = usize::MAX;
        self
    }

    pub fn fail_first(mut self, attempts: usize) -> Self {
        self.fail_first = attempts;
        self
    }

    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn rejecting_params(mut self) -> Self {
        self.valid = false;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn gauge(mut self, gauge: &Arc<ConcurrencyGauge>) -> Self {
        self.gauge = Some(Arc::clone(gauge));
        self
    }

    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }

    /// Finish building, returning the agent and its probe
    pub fn build(self) -> (Arc<dyn Agent>, Arc<Probe>) {
        let probe = self.probe();
        (Arc::new(self), probe)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn metadata(&self) -> &AgentMetadata {
        &self.metadata
    }

    fn validate(&self, _params: &Params) -> bool {
        self.probe.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.valid
    }

    async fn execute(&self, params: Params) -> Result<Value> {
        let attempt = self.probe.execute_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(gauge) = &self.gauge {
            gauge.enter();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(gauge) = &self.gauge {
            gauge.exit();
        }

        if self.panics {
            panic!("scripted panic");
        }

        self.probe.completed.fetch_add(1, Ordering::SeqCst);

        if attempt <= self.fail_first {
            return Err(AgentError::failed(format!("scripted failure #{}", attempt)));
        }

        Ok(json!({ "agent": self.metadata.name, "attempt": attempt, "params": params }))
    }

    async fn initialize(&self) -> Result<()> {
        self.probe.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_initialize {
            return Err(AgentError::InitializationFailed("scripted".into()));
        }
        Ok(())
    }

    async fn cleanup(&self) {
        self.probe.cleanup_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Registry holding the given agents, in order
pub fn registry_of(agents: Vec<Arc<dyn Agent>>) -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    registry
        .register_all(agents)
        .expect("test agents must have unique names");
    registry
}
