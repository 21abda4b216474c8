use crate::config::KeyConfig;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Continue,
    Abort,
}

/// Signals gathered since the previous tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputSignal {
    pub continue_pressed: bool,
    pub abort: bool,
}

impl InputSignal {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn continue_key() -> Self {
        Self {
            continue_pressed: true,
            abort: false,
        }
    }

    pub fn abort() -> Self {
        Self {
            continue_pressed: false,
            abort: true,
        }
    }
}

/// Maps key names to logical signals and latches them until the next poll.
///
/// Key events arrive from the window loop; `poll` never blocks.
#[derive(Debug, Clone)]
pub struct InputController {
    continue_keys: HashSet<String>,
    abort_keys: HashSet<String>,
    pending: InputSignal,
}

impl InputController {
    pub fn new(keys: &KeyConfig) -> Self {
        let norm = |v: &[String]| v.iter().map(|k| k.to_lowercase()).collect();
        Self {
            continue_keys: norm(&keys.continue_keys),
            abort_keys: norm(&keys.abort_keys),
            pending: InputSignal::default(),
        }
    }

    pub fn classify(&self, key: &str) -> Option<KeyAction> {
        let key = key.to_lowercase();
        if self.abort_keys.contains(&key) {
            Some(KeyAction::Abort)
        } else if self.continue_keys.contains(&key) {
            Some(KeyAction::Continue)
        } else {
            None
        }
    }

    pub fn on_key(&mut self, key: &str) -> Option<KeyAction> {
        let action = self.classify(key)?;
        match action {
            KeyAction::Continue => self.pending.continue_pressed = true,
            KeyAction::Abort => self.pending.abort = true,
        }
        Some(action)
    }

    /// Takes the latched signals.
    pub fn poll(&mut self) -> InputSignal {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_abort_keys_mean_the_same() {
        let input = InputController::new(&KeyConfig::default());
        assert_eq!(input.classify("q"), Some(KeyAction::Abort));
        assert_eq!(input.classify("Escape"), Some(KeyAction::Abort));
        assert_eq!(input.classify("c"), Some(KeyAction::Continue));
        assert_eq!(input.classify("space"), None);
    }

    #[test]
    fn poll_drains_latched_signals() {
        let mut input = InputController::new(&KeyConfig::default());
        input.on_key("x");
        assert_eq!(input.poll(), InputSignal::none());
        input.on_key("C");
        input.on_key("escape");
        let signal = input.poll();
        assert!(signal.continue_pressed && signal.abort);
        assert_eq!(input.poll(), InputSignal::none());
    }
}
