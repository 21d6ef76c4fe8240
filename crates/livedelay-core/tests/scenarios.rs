use livedelay_core::{
    DelayManager, DelayManagerConfig, FeedItem, RecordingSink, RevealCause, SinkEvent,
    StaticNotifier, VirtualScheduler,
};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Debug, Deserialize)]
struct Scenario {
    name: String,
    #[allow(dead_code)]
    description: String,
    #[serde(default)]
    capacity: Option<usize>,
    #[serde(default = "default_true")]
    feed_available: bool,
    steps: Vec<Step>,
    expect: Expect,
}

#[derive(Debug, Deserialize)]
struct Step {
    at: u64,
    #[serde(flatten)]
    action: Action,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Action {
    Start { delay_ms: u64 },
    SetDelay { delay_ms: u64 },
    Arrive { id: String },
    Burst { prefix: String, count: usize },
    Stop,
    Advance,
}

#[derive(Debug, Deserialize)]
struct Expect {
    reveals: Vec<ExpectedReveal>,
    #[serde(default)]
    never_hidden: Vec<String>,
    #[serde(default)]
    queue_sizes: Option<Vec<usize>>,
    final_queue_size: usize,
    active: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
struct ExpectedReveal {
    id: String,
    at: u64,
    cause: RevealCause,
}

fn default_true() -> bool {
    true
}

fn scenarios_dir() -> PathBuf {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest.join("../../fixtures/scenarios")
}

fn load_scenarios() -> Vec<Scenario> {
    let dir = scenarios_dir();
    let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
        .unwrap_or_else(|e| panic!("failed to read {dir:?}: {e}"))
        .map(|entry| entry.unwrap().path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let content = fs::read_to_string(path).unwrap_or_else(|e| {
                panic!("failed to read scenario {:?}: {}", path, e);
            });
            serde_json::from_str(&content).unwrap_or_else(|e| {
                panic!("failed to parse scenario {:?}: {}", path, e);
            })
        })
        .collect()
}

/// Replay one scenario, stamping each reveal with the time of the step
/// during which it happened.
fn replay(scenario: &Scenario) {
    let notifier = if scenario.feed_available {
        StaticNotifier::available()
    } else {
        StaticNotifier::absent()
    };
    let config = DelayManagerConfig {
        capacity: scenario.capacity.unwrap_or(livedelay_core::MAX_QUEUE_SIZE),
    };
    let mut m = DelayManager::with_config(
        RecordingSink::new(),
        VirtualScheduler::new(),
        notifier,
        config,
    );
    let sizes = Arc::new(Mutex::new(Vec::new()));
    let sizes_in = Arc::clone(&sizes);
    m.on_queue_size_change(move |size| sizes_in.lock().unwrap().push(size));

    let mut reveals = Vec::new();
    let mut seen_events = 0;

    for step in &scenario.steps {
        m.advance_to(step.at);
        match &step.action {
            Action::Start { delay_ms } => {
                m.start(*delay_ms);
            }
            Action::SetDelay { delay_ms } => m.set_delay(*delay_ms),
            Action::Arrive { id } => {
                m.handle_arrival(FeedItem::new(id.clone(), id.clone()), step.at);
            }
            Action::Burst { prefix, count } => {
                for i in 0..*count {
                    let id = format!("{prefix}{i}");
                    m.handle_arrival(FeedItem::new(id.clone(), id), step.at);
                }
            }
            Action::Stop => {
                m.stop();
            }
            Action::Advance => {}
        }

        let events = m.sink().events();
        for event in &events[seen_events..] {
            if let SinkEvent::Revealed(id, cause) = event {
                reveals.push(ExpectedReveal {
                    id: id.clone(),
                    at: step.at,
                    cause: *cause,
                });
            }
        }
        seen_events = events.len();
        assert!(
            m.queue_size() <= m.capacity(),
            "[{}] capacity exceeded at t={}",
            scenario.name,
            step.at
        );
    }

    assert_eq!(reveals, scenario.expect.reveals, "[{}] reveals", scenario.name);
    for id in &scenario.expect.never_hidden {
        assert_eq!(
            m.sink().hide_count(id),
            0,
            "[{}] {id} should never be hidden",
            scenario.name
        );
    }
    if let Some(expected) = &scenario.expect.queue_sizes {
        assert_eq!(
            &*sizes.lock().unwrap(),
            expected,
            "[{}] queue size notifications",
            scenario.name
        );
    }
    assert_eq!(
        m.queue_size(),
        scenario.expect.final_queue_size,
        "[{}] final queue size",
        scenario.name
    );
    assert_eq!(m.is_active(), scenario.expect.active, "[{}] active", scenario.name);
}

#[test]
fn test_all_scenarios() {
    let scenarios = load_scenarios();
    assert!(
        !scenarios.is_empty(),
        "no scenarios found in {:?}",
        scenarios_dir()
    );
    for scenario in &scenarios {
        replay(scenario);
    }
}
