//! Menu hand-off
//!
//! While the menu is open the vehicle stops interpreting the primary button
//! and the level channel itself; both are queued here for the external menu
//! collaborator, which drains them with [`MenuLink::next_event`].

use heapless::Deque;

use crate::button::ButtonEvent;

/// Events buffered between two menu polls
pub const MENU_QUEUE_DEPTH: usize = 16;

/// Input forwarded to the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuEvent {
    /// Primary button event
    ///
    /// `clicks` counts the presses in the current run of quick clicks:
    /// 1 for an isolated click, 2 for a double click and so on.
    Button { event: ButtonEvent, clicks: u8 },
    /// New level channel setting (percent)
    Level(u8),
}

/// Queue of menu input with level de-duplication
#[derive(Debug, Default)]
pub struct MenuLink {
    queue: Deque<MenuEvent, MENU_QUEUE_DEPTH>,
    last_level: Option<u8>,
}

impl MenuLink {
    pub const fn new() -> Self {
        Self {
            queue: Deque::new(),
            last_level: None,
        }
    }

    /// Queue an event; the oldest one is dropped when full
    pub fn push(&mut self, event: MenuEvent) {
        if let MenuEvent::Level(level) = event {
            if self.last_level == Some(level) {
                return;
            }
            self.last_level = Some(level);
        }
        if self.queue.is_full() {
            self.queue.pop_front();
        }
        let _ = self.queue.push_back(event);
    }

    /// Take the oldest pending event
    pub fn next_event(&mut self) -> Option<MenuEvent> {
        self.queue.pop_front()
    }

    /// Drop pending input; the next level reading is forwarded again
    pub fn reset(&mut self) {
        self.queue.clear();
        self.last_level = None;
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
