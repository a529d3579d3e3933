//! The user interface collaborator. The session never owns buffers: it only holds `BufferId`
//! handles and goes through this trait for every buffer, nicklist or printing operation. The UI
//! may ignore any of them.
use std::collections::HashMap;
use std::ops::ControlFlow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An opaque handle to a buffer owned by the UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferId(pub u64);

/// What a buffer shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    /// The server (or merged servers) buffer.
    Server,
    /// A channel.
    Channel,
    /// A private conversation.
    Private,
}

/// A printed line, as the UI stores it.
#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    /// When the line was printed (or the server-time of the message).
    pub date: DateTime<Utc>,
    /// Line tags, such as `irc_join` or `nick_alice`.
    pub tags: Vec<String>,
    /// The displayed text.
    pub message: String,
}

impl Line {
    /// Whether the line carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Operations the session needs from the user interface.
pub trait Ui {
    /// Creates a buffer, or returns the existing buffer with that name.
    fn buffer_new(&mut self, name: &str, kind: BufferKind) -> Option<BufferId>;

    /// Finds a buffer by name.
    fn buffer_search(&self, name: &str) -> Option<BufferId>;

    /// Closes a buffer. The UI does not call back into the session for closes it was asked for.
    fn buffer_close(&mut self, buffer: BufferId);

    /// Sets a buffer property.
    fn buffer_set(&mut self, buffer: BufferId, property: &str, value: &str);

    /// Reads a string buffer property.
    fn buffer_get_string(&self, buffer: BufferId, property: &str) -> Option<String>;

    /// Reads an integer buffer property, such as `number`.
    fn buffer_get_integer(&self, buffer: BufferId, property: &str) -> Option<i64>;

    /// Adds a nicklist group.
    fn nicklist_add_group(&mut self, buffer: BufferId, group: &str);

    /// Adds (or moves) a nick to a nicklist group.
    fn nicklist_add_nick(&mut self, buffer: BufferId, group: &str, nick: &str, prefix: &str);

    /// Removes a nick from the nicklist.
    fn nicklist_remove_nick(&mut self, buffer: BufferId, nick: &str);

    /// Clears the nicklist.
    fn nicklist_remove_all(&mut self, buffer: BufferId);

    /// Prints a tagged line; `None` is the core buffer.
    fn print(&mut self, buffer: Option<BufferId>, date: DateTime<Utc>, tags: &[String], message: &str);

    /// Walks the lines of a buffer from the newest to the oldest, letting the callback edit each
    /// one, until it breaks.
    fn lines_rev(&mut self, buffer: BufferId, f: &mut dyn FnMut(&mut Line) -> ControlFlow<()>);
}

/// A buffer held by `MemoryUi`.
#[derive(Clone, Debug)]
pub struct MemoryBuffer {
    /// The buffer handle.
    pub id: BufferId,
    /// The buffer name.
    pub name: String,
    /// The buffer kind.
    pub kind: BufferKind,
    /// Properties set by the session.
    pub properties: HashMap<String, String>,
    /// Nicklist groups.
    pub groups: Vec<String>,
    /// Nicklist entries as `(group, nick, prefix)`.
    pub nicks: Vec<(String, String, String)>,
    /// Printed lines, oldest first.
    pub lines: Vec<Line>,
}

/// A user interface that keeps everything in memory, used by tests and headless drivers.
#[derive(Debug, Default)]
pub struct MemoryUi {
    buffers: Vec<MemoryBuffer>,
    core: Vec<Line>,
    next_id: u64,
}

impl MemoryUi {
    /// Creates an empty UI.
    pub fn new() -> MemoryUi {
        MemoryUi::default()
    }

    /// Looks a buffer up by handle.
    pub fn buffer(&self, buffer: BufferId) -> Option<&MemoryBuffer> {
        self.buffers.iter().find(|b| b.id == buffer)
    }

    /// Looks a buffer up by name.
    pub fn buffer_by_name(&self, name: &str) -> Option<&MemoryBuffer> {
        self.buffers.iter().find(|b| b.name == name)
    }

    /// The names of all open buffers, in creation order.
    pub fn buffer_names(&self) -> Vec<String> {
        self.buffers.iter().map(|b| b.name.clone()).collect()
    }

    /// Lines printed to the core buffer.
    pub fn core_lines(&self) -> &[Line] {
        &self.core
    }

    /// Lines printed to the named buffer.
    pub fn lines(&self, name: &str) -> Vec<Line> {
        self.buffer_by_name(name).map(|b| b.lines.clone()).unwrap_or_default()
    }

    fn buffer_mut(&mut self, buffer: BufferId) -> Option<&mut MemoryBuffer> {
        self.buffers.iter_mut().find(|b| b.id == buffer)
    }
}

impl Ui for MemoryUi {
    fn buffer_new(&mut self, name: &str, kind: BufferKind) -> Option<BufferId> {
        if let Some(buffer) = self.buffers.iter_mut().find(|b| b.name == name) {
            buffer.kind = kind;
            return Some(buffer.id);
        }
        self.next_id += 1;
        let id = BufferId(self.next_id);
        self.buffers.push(MemoryBuffer {
            id,
            name: name.to_owned(),
            kind,
            properties: HashMap::new(),
            groups: vec![],
            nicks: vec![],
            lines: vec![],
        });
        Some(id)
    }

    fn buffer_search(&self, name: &str) -> Option<BufferId> {
        self.buffer_by_name(name).map(|b| b.id)
    }

    fn buffer_close(&mut self, buffer: BufferId) {
        self.buffers.retain(|b| b.id != buffer);
    }

    fn buffer_set(&mut self, buffer: BufferId, property: &str, value: &str) {
        if let Some(buffer) = self.buffer_mut(buffer) {
            if property == "name" {
                buffer.name = value.to_owned();
            }
            buffer.properties.insert(property.to_owned(), value.to_owned());
        }
    }

    fn buffer_get_string(&self, buffer: BufferId, property: &str) -> Option<String> {
        let buffer = self.buffer(buffer)?;
        match property {
            "name" => Some(buffer.name.clone()),
            _ => buffer.properties.get(property).cloned(),
        }
    }

    fn buffer_get_integer(&self, buffer: BufferId, property: &str) -> Option<i64> {
        let pos = self.buffers.iter().position(|b| b.id == buffer)?;
        let value = self.buffers[pos].properties.get(property).and_then(|v| v.parse().ok());
        match property {
            "number" => value.or(Some(pos as i64 + 1)),
            _ => value,
        }
    }

    fn nicklist_add_group(&mut self, buffer: BufferId, group: &str) {
        if let Some(buffer) = self.buffer_mut(buffer) {
            if !buffer.groups.iter().any(|g| g == group) {
                buffer.groups.push(group.to_owned());
            }
        }
    }

    fn nicklist_add_nick(&mut self, buffer: BufferId, group: &str, nick: &str, prefix: &str) {
        if let Some(buffer) = self.buffer_mut(buffer) {
            buffer.nicks.retain(|(_, n, _)| n != nick);
            buffer.nicks.push((group.to_owned(), nick.to_owned(), prefix.to_owned()));
        }
    }

    fn nicklist_remove_nick(&mut self, buffer: BufferId, nick: &str) {
        if let Some(buffer) = self.buffer_mut(buffer) {
            buffer.nicks.retain(|(_, n, _)| n != nick);
        }
    }

    fn nicklist_remove_all(&mut self, buffer: BufferId) {
        if let Some(buffer) = self.buffer_mut(buffer) {
            buffer.nicks.clear();
        }
    }

    fn print(&mut self, buffer: Option<BufferId>, date: DateTime<Utc>, tags: &[String], message: &str) {
        let line = Line {
            date,
            tags: tags.to_vec(),
            message: message.to_owned(),
        };
        match buffer.and_then(|id| self.buffer_mut(id)) {
            Some(buffer) => buffer.lines.push(line),
            None => self.core.push(line),
        }
    }

    fn lines_rev(&mut self, buffer: BufferId, f: &mut dyn FnMut(&mut Line) -> ControlFlow<()>) {
        if let Some(buffer) = self.buffer_mut(buffer) {
            for line in buffer.lines.iter_mut().rev() {
                if let ControlFlow::Break(()) = f(line) {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::ops::ControlFlow;

    use chrono::Utc;

    use super::{BufferKind, MemoryUi, Ui};

    #[test]
    fn buffer_new_reuses_names() {
        let mut ui = MemoryUi::new();
        let a = ui.buffer_new("libera.#rust", BufferKind::Channel);
        let b = ui.buffer_new("libera.#rust", BufferKind::Private);
        assert_eq!(a, b);
        assert_eq!(ui.buffer_names(), vec!["libera.#rust".to_owned()]);
        assert_eq!(ui.buffer(a.unwrap()).unwrap().kind, BufferKind::Private);
    }

    #[test]
    fn number_defaults_to_position() {
        let mut ui = MemoryUi::new();
        let a = ui.buffer_new("a", BufferKind::Server).unwrap();
        let b = ui.buffer_new("b", BufferKind::Channel).unwrap();
        assert_eq!(ui.buffer_get_integer(b, "number"), Some(2));
        ui.buffer_set(a, "number", "7");
        assert_eq!(ui.buffer_get_integer(a, "number"), Some(7));
        ui.buffer_close(a);
        assert_eq!(ui.buffer_get_integer(b, "number"), Some(1));
    }

    #[test]
    fn lines_rev_stops_on_break() {
        let mut ui = MemoryUi::new();
        let a = ui.buffer_new("a", BufferKind::Channel).unwrap();
        for i in 0..3 {
            ui.print(Some(a), Utc::now(), &[format!("n{}", i)], "text");
        }
        let mut seen = vec![];
        ui.lines_rev(a, &mut |line| {
            seen.push(line.tags[0].clone());
            line.tags.push("seen".to_owned());
            if seen.len() == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(seen, vec!["n2", "n1"]);
        assert!(!ui.lines("a")[0].has_tag("seen"));
        assert!(ui.lines("a")[1].has_tag("seen"));
    }
}
