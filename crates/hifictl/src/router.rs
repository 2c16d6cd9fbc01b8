// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Prefix-matched dispatch from whitespace-delimited textual commands to
//! one or more handlers.
//!
//! Registering `"foo bar"`, `"foo"`, and `""` (the catch-all), a command
//! `"foo bar baz"` routes to the `"foo bar"` handlers with remainder
//! `"baz"`; `"quux"` falls through to the catch-all with the whole string
//! as remainder.

use std::collections::HashMap;

/// A routed command: the matched key and whatever text remained after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    pub key: String,
    pub remainder: String,
}

/// Registers handlers under whitespace-delimited key prefixes and dispatches
/// commands to the longest matching registered prefix.
pub struct CommandRouter<H> {
    handlers: HashMap<String, Vec<H>>,
}

impl<H> Default for CommandRouter<H> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<H> CommandRouter<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `key` (e.g. `"avr vol+"`, or `""` for the
    /// catch-all). Multiple handlers may share a key; each is invoked on a
    /// match.
    pub fn register(&mut self, key: &str, handler: H) {
        self.handlers.entry(key.to_string()).or_default().push(handler);
    }

    /// Find the longest registered key that is a whitespace-delimited
    /// prefix of `command`, and split off the remainder.
    pub fn route(&self, command: &str) -> Routed {
        let words: Vec<&str> = command.split_whitespace().collect();
        for prefix_len in (0..=words.len()).rev() {
            let candidate = words[..prefix_len].join(" ");
            if self.handlers.contains_key(&candidate) {
                let remainder = words[prefix_len..].join(" ");
                return Routed {
                    key: candidate,
                    remainder,
                };
            }
        }
        // No match at all, not even "": caller should treat this as
        // CommandError per the spec's error-handling design.
        Routed {
            key: String::new(),
            remainder: command.to_string(),
        }
    }

    /// Dispatch `command` by invoking every handler registered for the
    /// longest matching prefix with the resolved remainder.
    pub fn dispatch(&self, command: &str, mut call: impl FnMut(&H, &str)) {
        let routed = self.route(command);
        if let Some(handlers) = self.handlers.get(&routed.key) {
            for handler in handlers {
                call(handler, &routed.remainder);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario D: prefix routing.
    #[test]
    fn longest_prefix_wins() {
        let mut router: CommandRouter<&'static str> = CommandRouter::new();
        router.register("foo bar", "foo-bar-handler");
        router.register("foo", "foo-handler");
        router.register("", "catch-all");

        assert_eq!(
            router.route("foo bar baz"),
            Routed {
                key: "foo bar".into(),
                remainder: "baz".into(),
            }
        );
        assert_eq!(
            router.route("foo qux"),
            Routed {
                key: "foo".into(),
                remainder: "qux".into(),
            }
        );
        assert_eq!(
            router.route("other"),
            Routed {
                key: "".into(),
                remainder: "other".into(),
            }
        );
    }

    #[test]
    fn dispatch_invokes_all_handlers_for_a_multi_handler_key() {
        let mut router: CommandRouter<&'static str> = CommandRouter::new();
        router.register("avr vol+", "handler-a");
        router.register("avr vol+", "handler-b");

        let mut seen = Vec::new();
        router.dispatch("avr vol+", |h, rest| seen.push((*h, rest.to_string())));
        assert_eq!(
            seen,
            vec![("handler-a", "".to_string()), ("handler-b", "".to_string())]
        );
    }

    #[test]
    fn dispatch_falls_through_to_catch_all() {
        let mut router: CommandRouter<&'static str> = CommandRouter::new();
        router.register("", "catch-all");
        router.register("avr on", "avr-on");

        let mut seen = Vec::new();
        router.dispatch("hdmi 3", |h, rest| seen.push((*h, rest.to_string())));
        assert_eq!(seen, vec![("catch-all", "hdmi 3".to_string())]);
    }
}
