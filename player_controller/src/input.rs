use std::collections::BTreeSet;

use character_motor_hop::DirectionKeys;
use rapier3d::prelude::Real;

/// Keyed pressed-state and pointer state written by event callbacks, read once per tick.
///
/// Key identifiers are compared case-insensitively (`"ArrowUp"` and `"arrowup"` are the same key).
#[derive(Clone, Debug, Default)]
pub struct InputSnapshot {
    held: BTreeSet<String>,
    pressed: BTreeSet<String>,
    pointer_ndc: Option<[Real; 2]>,
    clicks: Vec<[Real; 2]>,
}

impl InputSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&mut self, key: &str) {
        let key = normalize_key(key);
        if key.is_empty() {
            return;
        }
        if self.held.insert(key.clone()) {
            self.pressed.insert(key);
        }
    }

    pub fn key_up(&mut self, key: &str) {
        self.held.remove(&normalize_key(key));
    }

    pub fn release_all(&mut self) {
        self.held.clear();
        self.pressed.clear();
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held.contains(&normalize_key(key))
    }

    /// True when the key went down since the last [`InputSnapshot::end_frame`].
    pub fn was_pressed(&self, key: &str) -> bool {
        self.pressed.contains(&normalize_key(key))
    }

    pub fn held_keys(&self) -> impl Iterator<Item = &str> {
        self.held.iter().map(String::as_str)
    }

    pub fn pointer_move(&mut self, ndc: [Real; 2]) {
        self.pointer_ndc = Some(ndc);
    }

    pub fn pointer_leave(&mut self) {
        self.pointer_ndc = None;
    }

    pub fn pointer_ndc(&self) -> Option<[Real; 2]> {
        self.pointer_ndc
    }

    /// Queue a click at a pixel position.
    pub fn click(&mut self, pixel: [Real; 2]) {
        self.clicks.push(pixel);
    }

    pub fn take_clicks(&mut self) -> Vec<[Real; 2]> {
        std::mem::take(&mut self.clicks)
    }

    pub fn end_frame(&mut self) {
        self.pressed.clear();
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyBindings {
    pub up: Vec<String>,
    pub down: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub respawn: Vec<String>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        fn keys(list: &[&str]) -> Vec<String> {
            list.iter().map(|key| key.to_string()).collect()
        }
        Self {
            up: keys(&["w", "arrowup"]),
            down: keys(&["s", "arrowdown"]),
            left: keys(&["a", "arrowleft"]),
            right: keys(&["d", "arrowright"]),
            respawn: keys(&["r"]),
        }
    }
}

impl KeyBindings {
    pub fn direction_keys(&self, input: &InputSnapshot) -> DirectionKeys {
        let any_held = |keys: &[String]| keys.iter().any(|key| input.is_held(key));
        DirectionKeys {
            up: any_held(&self.up),
            down: any_held(&self.down),
            left: any_held(&self.left),
            right: any_held(&self.right),
        }
    }

    pub fn respawn_requested(&self, input: &InputSnapshot) -> bool {
        self.respawn.iter().any(|key| input.was_pressed(key))
    }
}
