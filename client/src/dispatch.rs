//! Channel-keyed handler registry for inbound frames

use log::debug;
use serde_json::Value;
use shared::Frame;
use std::collections::HashMap;

type Handler<C> = Box<dyn FnMut(&mut C, Value)>;

/// Routes inbound frames to the handler registered for their channel
///
/// Handlers receive the dispatch context mutably, so all dispatch happens on
/// the task that owns the context. Registering a channel twice replaces the
/// previous handler.
pub struct Dispatcher<C> {
    handlers: HashMap<String, Handler<C>>,
}

impl<C> Dispatcher<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `channel`, returning true if one was replaced
    pub fn on<F>(&mut self, channel: &str, handler: F) -> bool
    where
        F: FnMut(&mut C, Value) + 'static,
    {
        self.handlers
            .insert(channel.to_string(), Box::new(handler))
            .is_some()
    }

    /// Returns false when no handler is registered for the frame's channel
    pub fn dispatch(&mut self, context: &mut C, frame: Frame) -> bool {
        match self.handlers.get_mut(&frame.channel) {
            Some(handler) => {
                handler(context, frame.payload);
                true
            }
            None => {
                debug!("No handler for channel '{}'", frame.channel);
                false
            }
        }
    }
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(channel: &str, payload: Value) -> Frame {
        Frame {
            channel: channel.to_string(),
            payload,
        }
    }

    #[test]
    fn test_dispatch_to_registered_channel() {
        let mut dispatcher: Dispatcher<Vec<Value>> = Dispatcher::new();
        dispatcher.on("command", |seen, payload| seen.push(payload));

        let mut seen = Vec::new();
        assert!(dispatcher.dispatch(&mut seen, frame("command", json!(1))));
        assert_eq!(seen, vec![json!(1)]);
    }

    #[test]
    fn test_unregistered_channel_ignored() {
        let mut dispatcher: Dispatcher<Vec<Value>> = Dispatcher::new();
        dispatcher.on("command", |seen, payload| seen.push(payload));

        let mut seen = Vec::new();
        assert!(!dispatcher.dispatch(&mut seen, frame("other", json!(1))));
        assert!(seen.is_empty());
    }

    #[test]
    fn test_register_replaces_handler() {
        let mut dispatcher: Dispatcher<u32> = Dispatcher::new();
        assert!(!dispatcher.on("command", |count, _| *count += 1));
        assert!(dispatcher.on("command", |count, _| *count += 10));

        let mut count = 0;
        dispatcher.dispatch(&mut count, frame("command", Value::Null));
        assert_eq!(count, 10);
    }
}
