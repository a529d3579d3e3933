//! List-type channel modes (bans, exceptions, invite exceptions, quiets) and their numbered
//! items.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a modelist stands with respect to the server's copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelistState {
    /// Nothing known.
    Empty,
    /// The server is streaming the list.
    Receiving,
    /// The full list was received.
    Received,
    /// Changed locally since the last full list.
    Modified,
}

/// One mask of a modelist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelistItem {
    /// Stable number shown to the user.
    pub number: u32,
    /// The mask, such as `*!*@spam.example`.
    pub mask: String,
    /// Who set it, when known.
    pub setter: Option<String>,
    /// When it was set, when known.
    pub datetime: Option<DateTime<Utc>>,
}

/// The items of one list mode of a channel, in insertion order.
///
/// Items are numbered from the last item's number plus one (0 for an empty list) and are never
/// renumbered, so that a number shown to the user keeps designating the same mask until the list
/// is fetched again.
#[derive(Clone, Debug, PartialEq)]
pub struct Modelist {
    mode: char,
    state: ModelistState,
    items: Vec<ModelistItem>,
}

impl Modelist {
    /// Creates an empty modelist for `mode`.
    pub fn new(mode: char) -> Modelist {
        Modelist {
            mode,
            state: ModelistState::Empty,
            items: Vec::new(),
        }
    }

    /// The mode letter.
    pub fn mode(&self) -> char {
        self.mode
    }

    /// The current state.
    pub fn state(&self) -> ModelistState {
        self.state
    }

    /// Forces the state.
    pub fn set_state(&mut self, state: ModelistState) {
        self.state = state;
    }

    /// The items in insertion order.
    pub fn items(&self) -> &[ModelistItem] {
        &self.items
    }

    /// The number the next item will get.
    pub fn next_number(&self) -> u32 {
        self.items.last().map_or(0, |item| item.number + 1)
    }

    /// Appends a mask and returns its number.
    pub fn add(&mut self, mask: &str, setter: Option<&str>, datetime: Option<DateTime<Utc>>) -> u32 {
        let number = self.next_number();
        self.items.push(ModelistItem {
            number,
            mask: mask.to_owned(),
            setter: setter.map(|s| s.to_owned()),
            datetime,
        });
        if let ModelistState::Empty | ModelistState::Received = self.state {
            self.state = ModelistState::Modified;
        }
        number
    }

    /// Restores an item with its original number, keeping the state unchanged.
    pub fn restore(&mut self, item: ModelistItem) {
        self.items.push(item);
    }

    /// Looks an item up by mask.
    pub fn search_mask(&self, mask: &str) -> Option<&ModelistItem> {
        self.items.iter().find(|item| item.mask == mask)
    }

    /// Looks an item up by number.
    pub fn get(&self, number: u32) -> Option<&ModelistItem> {
        self.items.iter().find(|item| item.number == number)
    }

    /// Removes the item with this mask.
    pub fn remove_mask(&mut self, mask: &str) -> Option<ModelistItem> {
        let pos = self.items.iter().position(|item| item.mask == mask)?;
        Some(self.remove_at(pos))
    }

    /// Removes the item with this number.
    pub fn remove_number(&mut self, number: u32) -> Option<ModelistItem> {
        let pos = self.items.iter().position(|item| item.number == number)?;
        Some(self.remove_at(pos))
    }

    fn remove_at(&mut self, pos: usize) -> ModelistItem {
        if self.state == ModelistState::Received {
            self.state = ModelistState::Modified;
        }
        self.items.remove(pos)
    }

    /// Removes every item.
    pub fn clear(&mut self) {
        self.items.clear();
        self.state = ModelistState::Empty;
    }

    /// Called on each list entry numeric: the first one of a stream drops stale items.
    pub fn start_receiving(&mut self) {
        if self.state != ModelistState::Receiving {
            self.clear();
            self.state = ModelistState::Receiving;
        }
    }

    /// Called on the end-of-list numeric. A list that ends without any entry is empty.
    pub fn end_receiving(&mut self) {
        if self.state != ModelistState::Receiving {
            self.clear();
        }
        self.state = ModelistState::Received;
    }
}
