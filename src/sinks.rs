//! Collaborators receiving what the board reports.
//!
//! The link does not render anything itself. Status updates go to a
//! [`StatusSink`], everything that is not a status update or an
//! acknowledgment goes to a [`LogSink`].

use std::collections::BTreeMap;
use std::fmt;

use log::trace;

/// Receives status key updates (`$<name>:<value>` frames).
pub trait StatusSink {
    /// Set the value of the status key `name`. Implementations ignore names
    /// they do not know.
    fn update(&mut self, name: &str, value: &str);
}

/// Receives the opaque log lines of the board, newline stripped.
pub trait LogSink {
    fn append(&mut self, text: &[u8]);
}

/// Status key holding the number of the active station in the board queue.
pub const ACTIVE_STATION: &str = "ativa";

type Observer = Box<dyn FnMut(&str, &str)>;

/// A [`StatusSink`] holding the last value of a fixed set of status keys.
///
/// Keys are registered with [`watch`](StatusBoard::watch); updates for keys
/// that were never registered are dropped. An optional observer is told about
/// every accepted update.
#[derive(Default)]
pub struct StatusBoard {
    values: BTreeMap<String, Option<String>>,
    observer: Option<Observer>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a board watching each of `keys`.
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut board = Self::new();
        for key in keys {
            board.watch(key);
        }
        board
    }

    /// Register a key. Its value stays unknown until the board reports it.
    pub fn watch(&mut self, key: impl Into<String>) {
        self.values.entry(key.into()).or_insert(None);
    }

    /// Call `observer` with each accepted update.
    pub fn on_update(&mut self, observer: impl FnMut(&str, &str) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Last reported value of `key`, if the key is watched and was reported.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|value| value.as_deref())
    }

    pub fn is_watched(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

impl StatusSink for StatusBoard {
    fn update(&mut self, name: &str, value: &str) {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = Some(value.to_owned());
                if let Some(observer) = self.observer.as_mut() {
                    observer(name, value);
                }
            }
            None => trace!("ignoring update of unknown status `{}`", name),
        }
    }
}

impl fmt::Debug for StatusBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusBoard")
            .field("values", &self.values)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Collects log lines in memory.
impl LogSink for Vec<Vec<u8>> {
    fn append(&mut self, text: &[u8]) {
        self.push(text.to_vec());
    }
}
