use std::{fmt::Write as _, time::SystemTime};

use tracing::{
    Event, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context};

use super::{LogEntry, LogState};

/// Sépare le champ `message` des autres champs de l'event
#[derive(Default)]
struct EventText {
    message: String,
    extra: String,
}

impl EventText {
    fn push(&mut self, name: &str, rendered: String) {
        match name {
            "message" => self.message = rendered,
            other => {
                let _ = write!(self.extra, " {other}={rendered}");
            }
        }
    }

    fn into_line(mut self) -> String {
        self.message.push_str(&self.extra);
        self.message
    }
}

impl Visit for EventText {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field.name(), value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.push(field.name(), format!("{value:?}"));
    }
}

/// Layer `tracing` qui recopie chaque event dans le buffer circulaire
pub struct BufferLayer {
    sink: LogState,
}

impl BufferLayer {
    pub fn new(sink: LogState) -> Self {
        Self { sink }
    }
}

impl<S: Subscriber> Layer<S> for BufferLayer {
    fn on_event(&self, event: &Event<'_>, _: Context<'_, S>) {
        let meta = event.metadata();
        let mut text = EventText::default();
        event.record(&mut text);

        self.sink.push(LogEntry {
            timestamp: SystemTime::now(),
            level: meta.level().as_str().to_owned(),
            target: meta.target().to_owned(),
            message: text.into_line(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::{Registry, layer::SubscriberExt};

    #[test]
    fn test_events_are_buffered_with_fields() {
        let state = LogState::new(10);
        let subscriber = Registry::default().with(BufferLayer::new(state.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(video_id = "abc", "resolution failed");
        });

        let dump = state.dump();
        assert_eq!(dump.len(), 1);
        assert_eq!(dump[0].level, "WARN");
        assert_eq!(dump[0].message, "resolution failed video_id=abc");
    }
}
