use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskdag::exec::Inputs;
use taskdag::NodeSpec;

/// What happened to a node action, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Finished(String),
}

/// Builds node actions over `String` values that record when they start and
/// finish.
///
/// Each recording action returns `"<key>(<dep results>)"`, with dependency
/// results sorted by key, so tests can check exactly what a node received.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A node that succeeds immediately.
    pub fn node(&self, key: &str) -> NodeSpec<String> {
        self.node_with(key, Behaviour::Succeed)
    }

    /// A node that sleeps for `delay` and then succeeds.
    pub fn slow_node(&self, key: &str, delay: Duration) -> NodeSpec<String> {
        self.node_with(key, Behaviour::Sleep(delay))
    }

    /// A node whose action fails with `message`.
    pub fn failing_node(&self, key: &str, message: &str) -> NodeSpec<String> {
        self.node_with(key, Behaviour::Fail(message.to_string()))
    }

    /// A node that sleeps for `delay` unless the resolution is cancelled
    /// first.
    pub fn cancellable_node(&self, key: &str, delay: Duration) -> NodeSpec<String> {
        self.node_with(key, Behaviour::SleepUnlessCancelled(delay))
    }

    pub fn node_with(&self, key: &str, behaviour: Behaviour) -> NodeSpec<String> {
        let events = Arc::clone(&self.events);
        NodeSpec::from_fn(key, move |inputs: Inputs<String>| {
            let events = Arc::clone(&events);
            let behaviour = behaviour.clone();
            async move {
                let key = inputs.key().to_string();
                push(&events, Event::Started(key.clone()));

                match behaviour {
                    Behaviour::Succeed => {}
                    Behaviour::Sleep(delay) => tokio::time::sleep(delay).await,
                    Behaviour::SleepUnlessCancelled(delay) => {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = inputs.cancellation().cancelled() => {}
                        }
                    }
                    Behaviour::Fail(message) => {
                        push(&events, Event::Finished(key.clone()));
                        anyhow::bail!(message);
                    }
                }

                let value = render(&key, &inputs);
                push(&events, Event::Finished(key));
                anyhow::Ok(value)
            }
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Keys in the order their actions started.
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started(key) => Some(key),
                Event::Finished(_) => None,
            })
            .collect()
    }

    pub fn was_started(&self, key: &str) -> bool {
        self.started().iter().any(|k| k == key)
    }

    /// Number of times the action of `key` started.
    pub fn start_count(&self, key: &str) -> usize {
        self.started().iter().filter(|k| k.as_str() == key).count()
    }

    /// Position of `Finished(key)` in the event log.
    pub fn finished_at(&self, key: &str) -> Option<usize> {
        self.events()
            .iter()
            .position(|e| *e == Event::Finished(key.to_string()))
    }

    /// Position of `Started(key)` in the event log.
    pub fn started_at(&self, key: &str) -> Option<usize> {
        self.events()
            .iter()
            .position(|e| *e == Event::Started(key.to_string()))
    }
}

#[derive(Debug, Clone)]
pub enum Behaviour {
    Succeed,
    Sleep(Duration),
    SleepUnlessCancelled(Duration),
    Fail(String),
}

/// `"<key>(<dep results sorted by key>[, +<acquired>])"`.
pub fn render(key: &str, inputs: &Inputs<String>) -> String {
    let mut deps: Vec<(&String, &String)> = inputs.dependencies().iter().collect();
    deps.sort();
    let mut parts: Vec<String> = deps.into_iter().map(|(_, v)| v.clone()).collect();
    if let Some(acquired) = inputs.acquired() {
        parts.push(format!("+{acquired}"));
    }
    format!("{key}({})", parts.join(","))
}

fn push(events: &Mutex<Vec<Event>>, event: Event) {
    events.lock().unwrap().push(event);
}
