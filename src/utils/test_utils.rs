#[cfg(test)]
use crate::core::transport::{
    ChatTransport, Fragment, FragmentStream, RequestOptions, StreamError, StreamMessage,
    StreamRequest,
};
#[cfg(test)]
use async_trait::async_trait;
#[cfg(test)]
use futures_util::stream::{self, StreamExt};
#[cfg(test)]
use std::sync::Mutex;

/// What a [`ScriptedTransport`] was asked to send.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub roles: Vec<crate::core::message::Role>,
    pub options: RequestOptions,
}

/// Transport that replays fixed scripts, one per call, and records requests.
#[cfg(test)]
pub struct ScriptedTransport {
    scripts: Mutex<Vec<Result<Vec<StreamMessage>, StreamError>>>,
    pub requests: Mutex<Vec<RecordedRequest>>,
}

#[cfg(test)]
impl ScriptedTransport {
    pub fn new(script: Vec<StreamMessage>) -> Self {
        Self::sequence(vec![Ok(script)])
    }

    pub fn failing_open(err: StreamError) -> Self {
        Self::sequence(vec![Err(err)])
    }

    /// Scripts are used in order; the last one repeats once the others are used up.
    pub fn sequence(scripts: Vec<Result<Vec<StreamMessage>, StreamError>>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open_stream(&self, request: StreamRequest<'_>) -> Result<FragmentStream, StreamError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            model: request.model.to_string(),
            roles: request.messages.iter().map(|m| m.role).collect(),
            options: request.options.clone(),
        });

        let next = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.len() > 1 {
                scripts.remove(0)
            } else {
                scripts
                    .first()
                    .cloned()
                    .unwrap_or_else(|| Ok(vec![StreamMessage::End]))
            }
        };

        next.map(|script| stream::iter(script).boxed())
    }
}

#[cfg(test)]
pub fn answer(text: &str) -> StreamMessage {
    StreamMessage::Fragment(Fragment::answer(text))
}

#[cfg(test)]
pub fn reasoning(text: &str) -> StreamMessage {
    StreamMessage::Fragment(Fragment::reasoning(text))
}
