//! Scripted transport double shared by dispatcher and controller tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::SendError;
use crate::models::{Alert, Channel, Guardian, GuardianStatus, Relationship};

use super::ChannelTransport;

#[derive(Debug, Clone)]
pub(crate) enum Step {
    Deliver,
    Fail(SendError),
    /// Never completes
    Hang,
    DelayThenDeliver(Duration),
}

/// Plays back a per-guardian queue of steps, then a fallback step forever.
pub(crate) struct ScriptedTransport {
    name: String,
    fallback: Step,
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedTransport {
    pub(crate) fn new(name: &str, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fallback,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn script(&self, guardian_id: &str, steps: impl IntoIterator<Item = Step>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(guardian_id.to_string(), steps.into_iter().collect());
    }

    /// Instants at which `send` was entered for a guardian
    pub(crate) fn calls_for(&self, guardian_id: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == guardian_id)
            .map(|(_, at)| *at)
            .collect()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChannelTransport for ScriptedTransport {
    async fn send(&self, guardian: &Guardian, _channel: Channel, _alert: &Alert) -> Result<(), SendError> {
        let step = {
            self.calls
                .lock()
                .unwrap()
                .push((guardian.id.clone(), Instant::now()));
            self.scripts
                .lock()
                .unwrap()
                .get_mut(&guardian.id)
                .and_then(|queue| queue.pop_front())
                .unwrap_or_else(|| self.fallback.clone())
        };

        match step {
            Step::Deliver => Ok(()),
            Step::Fail(e) => Err(e),
            Step::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            Step::DelayThenDeliver(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) fn active_guardian(id: &str, channels: &[Channel]) -> Guardian {
    Guardian::new(id, id, "+8801712345678", channels.iter().copied(), Relationship::Family)
        .with_status(GuardianStatus::Active)
}
