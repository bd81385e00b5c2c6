//! Structured tracing emitted by the frame driver.

use std::sync::{Arc, Mutex};

use spatia_core::{Box3, Point, Vec3};
use spatia_layout::objectives::VisualMaximizeObjective;
use spatia_layout::{SceneGraph, SpatialSystem};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

#[derive(Debug, Clone, Default)]
struct Captured {
    spans: Vec<String>,
    events: Vec<(tracing::Level, String)>,
}

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Captured>>);

struct MessageVisitor(String);

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S> tracing_subscriber::Layer<S> for Capture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        self.0
            .lock()
            .unwrap()
            .spans
            .push(attrs.metadata().name().to_string());
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0
            .lock()
            .unwrap()
            .events
            .push((*event.metadata().level(), visitor.0));
    }
}

#[test]
fn frames_open_spans_and_log_layout_switches() {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());

    tracing::subscriber::with_default(subscriber, || {
        let mut scene = SceneGraph::new();
        let node = scene.add_node();
        scene.set_position(node, Vec3::new(0.0, 0.0, -3.0));
        scene.set_intrinsic_bounds(node, Box3::from_center_size(Point::origin(), Vec3::repeat(1.0)));
        let mut system = SpatialSystem::new(scene);
        let layout = system.adapter(node).unwrap().create_layout();
        layout.set_name("panel");
        layout.add_objective(VisualMaximizeObjective);
        system.update(1.0 / 60.0, 1.0 / 60.0).unwrap();
        system.update(1.0 / 60.0, 2.0 / 60.0).unwrap();
    });

    let captured = capture.0.lock().unwrap().clone();
    let frames = captured
        .spans
        .iter()
        .filter(|name| *name == "spatial_update")
        .count();
    assert_eq!(frames, 2);

    let messages: Vec<&str> = captured.events.iter().map(|(_, m)| m.as_str()).collect();
    assert!(messages.contains(&"adapter created"));
    let switches = captured
        .events
        .iter()
        .filter(|(level, m)| *level == tracing::Level::DEBUG && m == "layout switch")
        .count();
    assert_eq!(switches, 1);
}
