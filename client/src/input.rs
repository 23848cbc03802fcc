//! Input sampling with edge detection and chat-mode handling

use macroquad::prelude::*;
use shared::{Vector2, CHAT_MAX_LEN};

/// Directional keys held this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementKeys {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl MovementKeys {
    pub fn any(&self) -> bool {
        self.up || self.down || self.left || self.right
    }
}

/// Masks keys that were already held when chat mode opened or closed.
///
/// A masked key stays ignored until it is physically released, so typing
/// "w" into chat never turns into movement afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementLatch {
    masked: MovementKeys,
}

impl MovementLatch {
    /// Masks everything currently held.
    pub fn clear(&mut self, held: MovementKeys) {
        self.masked = held;
    }

    /// Unmasks released keys and returns the keys that should drive movement.
    pub fn filter(&mut self, raw: MovementKeys) -> MovementKeys {
        self.masked.up &= raw.up;
        self.masked.down &= raw.down;
        self.masked.left &= raw.left;
        self.masked.right &= raw.right;

        MovementKeys {
            up: raw.up && !self.masked.up,
            down: raw.down && !self.masked.down,
            left: raw.left && !self.masked.left,
            right: raw.right && !self.masked.right,
        }
    }
}

/// Everything the simulation needs from one frame of input.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    pub movement: MovementKeys,
    pub pointer: Vector2,
    pub slash: bool,
    pub charge: bool,
    /// True while the chat line is open.
    pub chatting: bool,
    /// A chat line submitted this frame.
    pub chat_submitted: Option<String>,
    pub quit: bool,
}

/// What a chat-related key did this frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    Opened,
    Submitted(String),
    Cancelled,
}

/// Chat composition state, independent of any windowing backend.
#[derive(Debug, Default)]
pub struct ChatComposer {
    open: bool,
    draft: String,
}

impl ChatComposer {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn draft(&self) -> Option<&str> {
        self.open.then_some(self.draft.as_str())
    }

    /// Enter opens the line, or submits it when already open.
    pub fn toggle(&mut self) -> ChatAction {
        if self.open {
            self.open = false;
            ChatAction::Submitted(std::mem::take(&mut self.draft))
        } else {
            self.open = true;
            self.draft.clear();
            ChatAction::Opened
        }
    }

    pub fn cancel(&mut self) -> Option<ChatAction> {
        if !self.open {
            return None;
        }
        self.open = false;
        self.draft.clear();
        Some(ChatAction::Cancelled)
    }

    pub fn type_char(&mut self, c: char) {
        if self.open && !c.is_control() && self.draft.chars().count() < CHAT_MAX_LEN {
            self.draft.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.open {
            self.draft.pop();
        }
    }
}

/// Samples macroquad's keyboard and mouse into [`InputState`]
pub struct InputManager {
    composer: ChatComposer,
    latch: MovementLatch,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            composer: ChatComposer::default(),
            latch: MovementLatch::default(),
        }
    }

    pub fn chat_draft(&self) -> Option<&str> {
        self.composer.draft()
    }

    fn sample_movement() -> MovementKeys {
        MovementKeys {
            up: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            down: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
        }
    }

    pub fn update(&mut self) -> InputState {
        let raw = Self::sample_movement();
        let (mouse_x, mouse_y) = mouse_position();
        let mut state = InputState {
            pointer: Vector2::new(mouse_x, mouse_y),
            ..InputState::default()
        };

        // Drain typed characters every frame so they never pile up
        let mut typed = Vec::new();
        while let Some(c) = get_char_pressed() {
            typed.push(c);
        }

        let mut transition = None;
        if is_key_pressed(KeyCode::Enter) {
            transition = Some(self.composer.toggle());
        } else if is_key_pressed(KeyCode::Escape) {
            transition = self.composer.cancel();
            state.quit = transition.is_none();
        }

        if let Some(action) = transition {
            self.latch.clear(raw);
            if let ChatAction::Submitted(text) = action {
                state.chat_submitted = Some(text);
            }
        } else if self.composer.is_open() {
            for c in typed {
                self.composer.type_char(c);
            }
            if is_key_pressed(KeyCode::Backspace) {
                self.composer.backspace();
            }
        }

        state.chatting = self.composer.is_open();
        if state.chatting {
            return state;
        }

        state.movement = self.latch.filter(raw);
        state.slash = is_mouse_button_pressed(MouseButton::Left);
        state.charge = is_key_pressed(KeyCode::E);
        state
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
