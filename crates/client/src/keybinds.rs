//! Prefix-key bindings.
//!
//! After the prefix byte (Ctrl+B), the next key selects an action from
//! this table. An optional `keybinds.conf` in the runtime directory
//! rebinds the defaults; its grammar is whitespace-separated tokens per
//! line, `prefix <key-char> <action-name>`, with `#` starting a comment.
//! Unknown action names are ignored.

use std::path::Path;

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    DetachSession,
    NewPane,
    NextPane,
    ScrollUp,
    ScrollDown,
}

impl KeyAction {
    fn from_name(name: &str) -> Option<KeyAction> {
        match name {
            "detach_session" => Some(KeyAction::DetachSession),
            "new_pane" => Some(KeyAction::NewPane),
            "next_pane" => Some(KeyAction::NextPane),
            "scroll_up" => Some(KeyAction::ScrollUp),
            "scroll_down" => Some(KeyAction::ScrollDown),
            _ => None,
        }
    }
}

pub struct Keybinds {
    bindings: Vec<(u8, KeyAction)>,
}

impl Default for Keybinds {
    fn default() -> Keybinds {
        Keybinds {
            bindings: vec![
                (b'd', KeyAction::DetachSession),
                (b'%', KeyAction::NewPane),
                (b'o', KeyAction::NextPane),
                (b'[', KeyAction::ScrollUp),
                (b']', KeyAction::ScrollDown),
            ],
        }
    }
}

impl Keybinds {
    /// Defaults overlaid with the config file, when present.
    pub fn load(config: &Path) -> Keybinds {
        let mut binds = Keybinds::default();
        if let Ok(text) = std::fs::read_to_string(config) {
            debug!(config = %config.display(), "loading key bindings");
            binds.apply_config(&text);
        }
        binds
    }

    fn apply_config(&mut self, text: &str) {
        for line in text.lines() {
            if line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let (Some(table), Some(key), Some(action)) =
                (tokens.next(), tokens.next(), tokens.next())
            else {
                continue;
            };
            if table != "prefix" {
                continue;
            }
            let Some(key) = key.bytes().next() else {
                continue;
            };
            let Some(action) = KeyAction::from_name(action) else {
                continue;
            };
            // Rebinding moves the action's key rather than adding a second
            // binding.
            for (bound_key, bound_action) in &mut self.bindings {
                if *bound_action == action {
                    *bound_key = key;
                }
            }
        }
    }

    /// Looks up the key pressed after the prefix. Uppercase alphabetics
    /// are lowercased before lookup; symbols match literally.
    pub fn lookup(&self, key: u8) -> Option<KeyAction> {
        let key = if key.is_ascii_uppercase() {
            key.to_ascii_lowercase()
        } else {
            key
        };
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == key)
            .map(|(_, action)| *action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_keys() {
        let binds = Keybinds::default();
        assert_eq!(binds.lookup(b'd'), Some(KeyAction::DetachSession));
        assert_eq!(binds.lookup(b'%'), Some(KeyAction::NewPane));
        assert_eq!(binds.lookup(b'o'), Some(KeyAction::NextPane));
        assert_eq!(binds.lookup(b'['), Some(KeyAction::ScrollUp));
        assert_eq!(binds.lookup(b']'), Some(KeyAction::ScrollDown));
        assert_eq!(binds.lookup(b'x'), None);
    }

    #[test]
    fn uppercase_letters_fold_to_their_binding() {
        let binds = Keybinds::default();
        assert_eq!(binds.lookup(b'D'), Some(KeyAction::DetachSession));
        // Symbols are looked up literally.
        assert_eq!(binds.lookup(b'{'), None);
    }

    #[test]
    fn config_rebinds_an_action() {
        let mut binds = Keybinds::default();
        binds.apply_config("prefix x detach_session\n");
        assert_eq!(binds.lookup(b'x'), Some(KeyAction::DetachSession));
        assert_eq!(binds.lookup(b'd'), None);
    }

    #[test]
    fn comments_and_junk_are_ignored() {
        let mut binds = Keybinds::default();
        binds.apply_config(
            "# a comment\n\
             prefix q not_an_action\n\
             table d detach_session\n\
             prefix\n",
        );
        assert_eq!(binds.lookup(b'd'), Some(KeyAction::DetachSession));
        assert_eq!(binds.lookup(b'q'), None);
    }
}
