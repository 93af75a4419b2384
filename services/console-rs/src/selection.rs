use crate::event::Event;

/// The event currently under inspection.
///
/// Holds its own copy, so it stays valid after the history evicts the original.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    current: Option<Event>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, event: &Event) {
        self.current = Some(event.clone());
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&Event> {
        self.current.as_ref()
    }
}
