//! Event capture for the game's `tracing` output.
//!
//! A custom subscriber files every info-level event into a table keyed by
//! its target, one row per event. Tests and tooling read the rows back or
//! dump them as JSON.
//!
//! # Usage
//!
//! ```ignore
//! // In game code:
//! tracing::info!(target: "nardis::finance", turn, player = %name, cost, "route queued");
//!
//! // In a test:
//! let (result, recorder) = instrument::capture(|| game.end_turn());
//! let finance = &recorder.tables["nardis::finance"];
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::{Event, Id, Metadata, Subscriber};

/// One recorded field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Str(String),
}

impl FieldValue {
    /// Integer view of the value, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::U64(v) => i64::try_from(*v).ok(),
            FieldValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::F64(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// A single event's fields. The event message, when present, is stored
/// under `message`.
pub type Row = BTreeMap<String, FieldValue>;

/// Every event recorded for one target, in emission order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Table {
    pub rows: Vec<Row>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one field, skipping rows that did not carry it.
    pub fn column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.rows.iter().filter_map(move |row| row.get(name))
    }

    /// Rows whose `message` equals `message`.
    pub fn with_message<'a>(&'a self, message: &'a str) -> impl Iterator<Item = &'a Row> + 'a {
        self.rows
            .iter()
            .filter(move |row| row.get("message").and_then(FieldValue::as_str) == Some(message))
    }
}

/// Collection of tables, keyed by tracing target.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Recorder {
    pub tables: HashMap<String, Table>,
}

impl Recorder {
    pub fn table(&self, target: &str) -> Option<&Table> {
        self.tables.get(target)
    }

    /// Number of rows recorded for `target`, zero when it never fired.
    pub fn count(&self, target: &str) -> usize {
        self.tables.get(target).map_or(0, Table::len)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(Table::is_empty)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

thread_local! {
    static RECORDER: RefCell<Recorder> = RefCell::default();
}

struct RowVisitor<'a> {
    row: &'a mut Row,
}

impl RowVisitor<'_> {
    fn put(&mut self, field: &Field, value: FieldValue) {
        self.row.insert(field.name().to_string(), value);
    }
}

impl Visit for RowVisitor<'_> {
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, FieldValue::U64(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, FieldValue::I64(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, FieldValue::F64(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, FieldValue::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, FieldValue::Str(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, FieldValue::Str(format!("{value:?}")));
    }
}

/// Subscriber that files info-level events into the thread-local recorder.
pub struct RecordingSubscriber;

impl Subscriber for RecordingSubscriber {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.is_event() && *metadata.level() <= tracing::Level::INFO
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        Id::from_u64(1)
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let mut row = Row::new();
        event.record(&mut RowVisitor { row: &mut row });
        let target = event.metadata().target().to_string();

        RECORDER.with(|r| {
            r.borrow_mut().tables.entry(target).or_default().rows.push(row);
        });
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

/// Install the recording subscriber as the global default. Later calls are
/// ignored.
pub fn install_subscriber() {
    let _ = tracing::subscriber::set_global_default(RecordingSubscriber);
}

/// Take everything recorded on this thread so far.
pub fn drain() -> Recorder {
    RECORDER.with(|r| std::mem::take(&mut *r.borrow_mut()))
}

pub fn clear() {
    RECORDER.with(|r| *r.borrow_mut() = Recorder::default());
}

/// Run `f` with the recording subscriber scoped to this thread and return
/// its result alongside what it emitted.
pub fn capture<T>(f: impl FnOnce() -> T) -> (T, Recorder) {
    clear();
    let result = tracing::subscriber::with_default(RecordingSubscriber, f);
    (result, drain())
}
