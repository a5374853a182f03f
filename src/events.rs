//! Observer hooks for call and chat lifecycles.
//!
//! Everything here is optional. Calls and chat turns emit [`Event`]s to the
//! [`EventHandler`] on the [`ExecCtx`](crate::ExecCtx) when one is set, which
//! is enough for progress output, token printing, or metrics. Chat renderers
//! should consume [`ChatEvent`](crate::agent::ChatEvent)s instead.

use std::sync::Arc;

/// Lifecycle events emitted by calls and chat turns.
#[derive(Debug, Clone)]
pub enum Event {
    /// A call or turn has started.
    CallStart {
        /// Instance name of the call or agent.
        name: String,
        /// Stable type identifier (`"llm-call"`, `"chat-turn"`).
        kind: &'static str,
    },
    /// A streamed text fragment arrived.
    Token { name: String, chunk: String },
    /// A call or turn has finished.
    CallEnd { name: String, ok: bool },
    /// A chat step (one model request) is starting.
    StepStart { name: String, step: u32 },
    /// A tool call was dispatched and settled.
    ToolDispatch {
        name: String,
        tool: String,
        call_id: String,
        /// `"output"`, `"failed"` or `"rejected"`.
        outcome: &'static str,
    },
}

/// Receives [`Event`]s.
///
/// # Example
///
/// ```
/// use llm_flows::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::Token { chunk, .. } => print!("{}", chunk),
///             Event::ToolDispatch { tool, outcome, .. } => println!("[{}] {}", tool, outcome),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_without_handler_is_noop() {
        emit(
            &None,
            Event::CallEnd {
                name: "x".into(),
                ok: true,
            },
        );
    }

    #[test]
    fn test_fn_handler_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Arc<dyn EventHandler> = Arc::new(FnEventHandler(move |event: Event| {
            if let Event::Token { chunk, .. } = event {
                sink.lock().unwrap().push(chunk);
            }
        }));
        let handler = Some(handler);
        emit(
            &handler,
            Event::Token {
                name: "t".into(),
                chunk: "Hel".into(),
            },
        );
        emit(
            &handler,
            Event::Token {
                name: "t".into(),
                chunk: "lo".into(),
            },
        );
        assert_eq!(*seen.lock().unwrap(), vec!["Hel", "lo"]);
    }
}
