use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{KbforgeError, Result};

/// Standing instruction sent with every question.
const INSTRUCTIONS: [&str; 1] = ["Always include sources"];

/// One question/answer exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub user: String,
    pub agent: String,
}

/// Explicit chat context, owned by the caller and threaded through each
/// `ask` call — there is no ambient session state in the core.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// The most recent `window` turns, oldest first.
    fn recent(&self, window: usize) -> &[ChatTurn] {
        let start = self.turns.len().saturating_sub(window);
        &self.turns[start..]
    }
}

#[derive(Serialize)]
struct RunRequest<'a> {
    model: &'a str,
    question: &'a str,
    instructions: &'a [&'a str],
    history: &'a [ChatTurn],
    markdown: bool,
}

#[derive(Deserialize)]
struct RunResponse {
    content: String,
}

/// Client for the retrieval-augmented agent service.
///
/// The agent itself (retrieval, prompting, generation) is an opaque
/// external collaborator; this client sends the question, the standing
/// instructions, and a bounded window of chat history, and records the
/// answer back into the session.
pub struct AgentClient {
    client: Client,
    base_url: Url,
    model: String,
    history_window: usize,
}

impl AgentClient {
    pub fn new(endpoint: &str, model: impl Into<String>, history_window: usize) -> Result<Self> {
        let base_url = Url::parse(endpoint)
            .map_err(|e| KbforgeError::Config(format!("invalid agent endpoint: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| KbforgeError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            model: model.into(),
            history_window,
        })
    }

    fn run_url(&self) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| KbforgeError::Config("agent endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v1", "agent", "run"]);
        Ok(url)
    }

    /// Ask one question. The answer is appended to the session so the next
    /// question carries it as history.
    pub async fn ask(&self, question: &str, session: &mut ChatSession) -> Result<String> {
        let request = RunRequest {
            model: &self.model,
            question,
            instructions: &INSTRUCTIONS,
            history: session.recent(self.history_window),
            markdown: true,
        };

        let response = self
            .client
            .post(self.run_url()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| KbforgeError::Agent(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KbforgeError::Agent(format!(
                "agent run failed (HTTP {})",
                response.status()
            )));
        }

        let run: RunResponse = response
            .json()
            .await
            .map_err(|e| KbforgeError::Agent(e.to_string()))?;

        session.turns.push(ChatTurn {
            user: question.to_string(),
            agent: run.content.clone(),
        });

        Ok(run.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(n: usize) -> ChatSession {
        let mut session = ChatSession::new();
        for i in 0..n {
            session.turns.push(ChatTurn {
                user: format!("q{i}"),
                agent: format!("a{i}"),
            });
        }
        session
    }

    #[test]
    fn test_history_window_keeps_most_recent_turns() {
        let session = session_with(8);
        let recent = session.recent(5);

        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].user, "q3");
        assert_eq!(recent[4].user, "q7");
    }

    #[test]
    fn test_history_window_larger_than_session() {
        let session = session_with(2);
        assert_eq!(session.recent(5).len(), 2);
        assert_eq!(ChatSession::new().recent(5).len(), 0);
    }

    #[test]
    fn test_run_request_serialization() {
        let session = session_with(1);
        let request = RunRequest {
            model: "llama3.2",
            question: "what is staged?",
            instructions: &INSTRUCTIONS,
            history: session.recent(5),
            markdown: true,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["instructions"][0], "Always include sources");
        assert_eq!(json["history"][0]["user"], "q0");
        assert_eq!(json["markdown"], true);
    }

    #[test]
    fn test_run_url_layout() {
        let agent = AgentClient::new("http://localhost:11434/", "llama3.2", 5).unwrap();
        assert_eq!(agent.run_url().unwrap().path(), "/v1/agent/run");
    }
}
