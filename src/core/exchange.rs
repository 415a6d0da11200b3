//! One streamed request/response cycle.
//!
//! [`exchange`] sends the whole conversation through a [`ChatTransport`],
//! pulls fragments one at a time, hands each to the matching channel callback
//! and accumulates the reasoning and answer channels separately. Nothing is
//! written back into the conversation; callers record the result themselves.

use std::io::Write;

use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::core::message::Conversation;
use crate::core::transport::{
    Channel, ChatTransport, RequestOptions, StreamError, StreamMessage, StreamRequest,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeResult {
    pub answer: String,
    pub reasoning: String,
}

type FragmentCallback<'a> = Box<dyn FnMut(&str) + 'a>;
type DoneCallback<'a> = Box<dyn FnOnce(&str, &str) + 'a>;

/// Per-exchange hooks. Every hook is optional and independent of the others.
#[derive(Default)]
pub struct StreamCallbacks<'a> {
    on_reasoning: Option<FragmentCallback<'a>>,
    on_answer: Option<FragmentCallback<'a>>,
    on_done: Option<DoneCallback<'a>>,
    live_print: Option<Box<dyn Write + 'a>>,
}

impl<'a> StreamCallbacks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_reasoning(mut self, callback: impl FnMut(&str) + 'a) -> Self {
        self.on_reasoning = Some(Box::new(callback));
        self
    }

    pub fn on_answer(mut self, callback: impl FnMut(&str) + 'a) -> Self {
        self.on_answer = Some(Box::new(callback));
        self
    }

    /// Called once with `(answer, reasoning)` after a successful stream.
    pub fn on_done(mut self, callback: impl FnOnce(&str, &str) + 'a) -> Self {
        self.on_done = Some(Box::new(callback));
        self
    }

    /// Echo fragments to `sink` as they arrive.
    pub fn live_print(mut self, sink: impl Write + 'a) -> Self {
        self.live_print = Some(Box::new(sink));
        self
    }

    pub fn live_print_stdout(self) -> Self {
        self.live_print(std::io::stdout())
    }
}

pub async fn exchange<T>(
    transport: &T,
    conversation: &Conversation,
    model: &str,
    options: &RequestOptions,
    callbacks: StreamCallbacks<'_>,
) -> Result<ExchangeResult, StreamError>
where
    T: ChatTransport + ?Sized,
{
    let StreamCallbacks {
        mut on_reasoning,
        mut on_answer,
        on_done,
        live_print,
    } = callbacks;

    let request = StreamRequest {
        messages: conversation.messages(),
        model,
        options,
    };
    let mut stream = match transport.open_stream(request).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!(%err, model, "could not open stream");
            return Err(err);
        }
    };
    debug!(model, messages = conversation.len(), "stream opened");

    let mut printer = live_print.map(LivePrinter::new);
    if let Some(printer) = printer.as_mut() {
        printer.header();
    }

    let mut result = ExchangeResult::default();
    let mut fragments = 0usize;

    let outcome = loop {
        match stream.next().await {
            Some(StreamMessage::Fragment(fragment)) => {
                if fragment.text.is_empty() {
                    continue;
                }
                fragments += 1;
                if let Some(printer) = printer.as_mut() {
                    printer.fragment(fragment.channel, &fragment.text);
                }
                match fragment.channel {
                    Channel::Reasoning => {
                        result.reasoning.push_str(&fragment.text);
                        if let Some(callback) = on_reasoning.as_mut() {
                            callback(&fragment.text);
                        }
                    }
                    Channel::Answer => {
                        result.answer.push_str(&fragment.text);
                        if let Some(callback) = on_answer.as_mut() {
                            callback(&fragment.text);
                        }
                    }
                }
            }
            Some(StreamMessage::Error(err)) => break Err(StreamError::Api(err)),
            Some(StreamMessage::End) => break Ok(()),
            None => break Err(StreamError::Interrupted),
        }
    };

    if let Some(printer) = printer.as_mut() {
        printer.finish();
    }

    match outcome {
        Ok(()) => {
            debug!(
                fragments,
                answer_len = result.answer.len(),
                reasoning_len = result.reasoning.len(),
                "stream completed"
            );
            if let Some(callback) = on_done {
                callback(&result.answer, &result.reasoning);
            }
            Ok(result)
        }
        Err(err) => {
            warn!(%err, fragments, "stream failed");
            Err(err)
        }
    }
}

/// Console echo of a running exchange. Write failures switch the echo off.
struct LivePrinter<'a> {
    sink: Option<Box<dyn Write + 'a>>,
    reasoning_started: bool,
    answer_started: bool,
}

impl<'a> LivePrinter<'a> {
    fn new(sink: Box<dyn Write + 'a>) -> Self {
        Self {
            sink: Some(sink),
            reasoning_started: false,
            answer_started: false,
        }
    }

    fn header(&mut self) {
        self.emit("🤖 Assistant: ");
    }

    fn fragment(&mut self, channel: Channel, text: &str) {
        match channel {
            Channel::Reasoning => {
                if !self.reasoning_started {
                    self.reasoning_started = true;
                    self.emit("🤔 (thinking...)\n");
                }
            }
            Channel::Answer => {
                if !self.answer_started {
                    self.answer_started = true;
                    if self.reasoning_started {
                        self.emit("\n\n✅ (answer)\n");
                    }
                }
            }
        }
        self.emit(text);
    }

    fn finish(&mut self) {
        self.emit("\n");
    }

    fn emit(&mut self, text: &str) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if let Err(err) = sink.write_all(text.as_bytes()).and_then(|_| sink.flush()) {
            warn!(%err, "live print disabled");
            self.sink = None;
        }
    }
}
