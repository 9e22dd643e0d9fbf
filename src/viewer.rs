//! Full size viewing of a single photo with circular navigation
use uuid::Uuid;

/// Minimum horizontal travel in pixels for a touch to count as a swipe.
pub const SWIPE_THRESHOLD: f32 = 50.0;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    #[default]
    Closed,
    Open(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Escape,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerMessage {
    Open(Uuid),
    Close,
    Next,
    Prev,
    Key(Key),
    TouchStart(f32),
    TouchMove(f32),
    TouchEnd,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Swipe {
    start: Option<f32>,
    end: Option<f32>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Viewer {
    state: ViewerState,
    swipe: Swipe,
}

impl Viewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ViewerState {
        self.state
    }

    pub fn current(&self) -> Option<Uuid> {
        match self.state {
            ViewerState::Closed => None,
            ViewerState::Open(id) => Some(id),
        }
    }

    pub fn is_open(&self) -> bool {
        self.current().is_some()
    }

    pub fn open(&mut self, id: Uuid) {
        self.state = ViewerState::Open(id);
    }

    pub fn close(&mut self) {
        self.state = ViewerState::Closed;
        self.swipe = Swipe::default();
    }

    /// Close the viewer when it is showing `id`.
    pub fn forget(&mut self, id: Uuid) {
        if self.current() == Some(id) {
            self.close();
        }
    }

    /// Close the viewer when its photo is no longer part of `ids`.
    pub fn retain(&mut self, mut ids: impl Iterator<Item = Uuid>) {
        if let Some(current) = self.current() {
            if !ids.any(|id| id == current) {
                self.close();
            }
        }
    }

    pub fn next(&mut self, visible: &[Uuid]) -> Option<Uuid> {
        self.step(visible, 1)
    }

    pub fn prev(&mut self, visible: &[Uuid]) -> Option<Uuid> {
        self.step(visible, visible.len().saturating_sub(1))
    }

    // Moves forward by `offset` places, wrapping at the end of `visible`.
    fn step(&mut self, visible: &[Uuid], offset: usize) -> Option<Uuid> {
        let current = self.current()?;
        if visible.len() < 2 {
            return None;
        }
        let index = visible.iter().position(|&id| id == current)?;
        let id = visible[(index + offset) % visible.len()];
        self.state = ViewerState::Open(id);
        Some(id)
    }

    pub fn key(&mut self, key: Key, visible: &[Uuid]) {
        if !self.is_open() {
            return;
        }
        match key {
            Key::ArrowRight => {
                self.next(visible);
            }
            Key::ArrowLeft => {
                self.prev(visible);
            }
            Key::Escape => self.close(),
            Key::Other => {}
        }
    }

    pub fn touch_start(&mut self, x: f32) {
        self.swipe = Swipe {
            start: Some(x),
            end: None,
        };
    }

    pub fn touch_move(&mut self, x: f32) {
        self.swipe.end = Some(x);
    }

    pub fn touch_end(&mut self, visible: &[Uuid]) {
        let Swipe { start, end } = std::mem::take(&mut self.swipe);
        let (Some(start), Some(end)) = (start, end) else {
            return;
        };
        let distance = start - end;
        if distance >= SWIPE_THRESHOLD {
            self.next(visible);
        } else if distance <= -SWIPE_THRESHOLD {
            self.prev(visible);
        }
    }

    pub fn update(&mut self, message: ViewerMessage, visible: &[Uuid]) {
        match message {
            ViewerMessage::Open(id) => self.open(id),
            ViewerMessage::Close => self.close(),
            ViewerMessage::Next => {
                self.next(visible);
            }
            ViewerMessage::Prev => {
                self.prev(visible);
            }
            ViewerMessage::Key(key) => self.key(key, visible),
            ViewerMessage::TouchStart(x) => self.touch_start(x),
            ViewerMessage::TouchMove(x) => self.touch_move(x),
            ViewerMessage::TouchEnd => self.touch_end(visible),
        }
    }
}
