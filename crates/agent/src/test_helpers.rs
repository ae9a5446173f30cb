//! Shared test helpers for agent tests.

use std::sync::Mutex;

use async_trait::async_trait;
use kbchat_core::error::ProviderError;
use kbchat_core::message::Message;
use kbchat_core::provider::{FragmentStream, Provider, ProviderRequest, ProviderResponse};
use kbchat_core::stream::TokenFragment;
use tokio::sync::mpsc;

/// One scripted model response.
pub type Cycle = Result<Vec<TokenFragment>, ProviderError>;

/// A provider that streams a fixed sequence of responses.
///
/// Each call to `stream` plays the next cycle. Panics if more calls are
/// made than cycles provided.
pub struct ScriptedProvider {
    cycles: Mutex<Vec<Cycle>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(cycles: Vec<Cycle>) -> Self {
        Self {
            cycles: Mutex::new(cycles),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            message: Message::assistant("unused"),
            usage: None,
            model: request.model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<FragmentStream, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let cycle = {
            let mut cycles = self.cycles.lock().unwrap();
            if cycles.is_empty() {
                panic!("ScriptedProvider: no more cycles (call #{call})");
            }
            cycles.remove(0)
        };

        let fragments = cycle?;
        let (tx, rx) = mpsc::channel(fragments.len().max(1));
        for fragment in fragments {
            let _ = tx.try_send(Ok(fragment));
        }
        Ok(rx)
    }
}

/// A tool call delivered in small argument chunks, the way real streams do.
pub fn chunked_call(id: &str, name: &str, arguments: serde_json::Value) -> Vec<TokenFragment> {
    let text = arguments.to_string();
    let mut fragments = vec![TokenFragment::tool_call(Some(id.into()), Some(name.into()), "")];
    let chars: Vec<char> = text.chars().collect();
    for chunk in chars.chunks(7) {
        fragments.push(TokenFragment::arguments(chunk.iter().collect::<String>()));
    }
    fragments
}

pub fn final_answer(id: &str, answer: &str, tools_used: &[&str]) -> Vec<TokenFragment> {
    chunked_call(
        id,
        "final_answer",
        serde_json::json!({"answer": answer, "tools_used": tools_used}),
    )
}
