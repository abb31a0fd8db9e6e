//! Submission lifecycle: optimistic update, one inference call, patch-in
//!
//! A submission moves `Idle → Submitting → AwaitingInference` in
//! [`ConversationController::begin`], which runs synchronously against the
//! store and hands back a [`Submission`] ticket. Whoever runs the request
//! passes the ticket and the result to [`ConversationController::complete`],
//! which resolves the placeholder and returns the controller to `Idle`.
//! [`ConversationController::submit`] does both around an [`InferenceClient`].

use tracing::{error, info};

use crate::ai::InferenceClient;
use crate::config::Config;
use crate::error::{SubmitError, TransportError};
use crate::filter::filter;
use crate::state::{ChatMessage, ChatRole, MessagePatch, INFERENCE_ERROR_MESSAGE};
use crate::store::ChatStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    AwaitingInference,
    Resolved,
    Failed,
}

/// An accepted submission waiting on the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Conversation that was active when the user submitted
    pub conversation_id: String,
    /// Full prompt sent to the model, preamble included
    pub prompt: String,
}

pub struct ConversationController {
    state: SubmissionState,
    preamble: Option<String>,
    filter_responses: bool,
}

impl Default for ConversationController {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationController {
    /// No preamble, responses filtered
    pub fn new() -> Self {
        Self {
            state: SubmissionState::Idle,
            preamble: None,
            filter_responses: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .with_preamble(config.system_preamble().map(str::to_string))
            .with_filter(config.filter_responses())
    }

    pub fn with_preamble(mut self, preamble: Option<String>) -> Self {
        self.preamble = preamble;
        self
    }

    pub fn with_filter(mut self, enabled: bool) -> Self {
        self.filter_responses = enabled;
        self
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            SubmissionState::Submitting | SubmissionState::AwaitingInference
        )
    }

    pub fn build_prompt(&self, input: &str) -> String {
        match &self.preamble {
            Some(preamble) => format!("{} User question: {}", preamble, input),
            None => input.to_string(),
        }
    }

    /// Accept `input` and apply the optimistic update to the active conversation.
    pub fn begin(&mut self, store: &mut ChatStore, input: &str) -> Result<Submission, SubmitError> {
        if input.trim().is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        if self.is_busy() {
            return Err(SubmitError::Busy);
        }

        self.state = SubmissionState::Submitting;

        let conversation_id = store.ensure_active();

        let first_user_message = store
            .get(&conversation_id)
            .map(|c| !c.messages.iter().any(|m| m.role == ChatRole::User))
            .unwrap_or(true);

        store.append_message(&conversation_id, ChatMessage::user(input));
        if first_user_message {
            store.rename_from_first_user_message(&conversation_id, input);
        }
        store.append_message(&conversation_id, ChatMessage::thinking());

        self.state = SubmissionState::AwaitingInference;
        info!(conversation = %conversation_id, "submitted prompt");

        Ok(Submission {
            prompt: self.build_prompt(input),
            conversation_id,
        })
    }

    /// Resolve the placeholder of `submission` with the model's answer or the
    /// fixed apology. Always leaves the controller idle; returns the outcome.
    pub fn complete(
        &mut self,
        store: &mut ChatStore,
        submission: Submission,
        result: Result<String, TransportError>,
    ) -> SubmissionState {
        let (content, outcome) = match result {
            Ok(text) => {
                let text = if self.filter_responses { filter(&text) } else { text };
                (text, SubmissionState::Resolved)
            }
            Err(e) => {
                error!(error = %e, conversation = %submission.conversation_id, "error generating response");
                (INFERENCE_ERROR_MESSAGE.to_string(), SubmissionState::Failed)
            }
        };

        store.replace_last_message(&submission.conversation_id, MessagePatch::resolved(content));

        info!(conversation = %submission.conversation_id, ?outcome, "submission finished");
        self.state = SubmissionState::Idle;
        outcome
    }

    /// Run a whole submission against `client`
    pub async fn submit(
        &mut self,
        store: &mut ChatStore,
        client: &dyn InferenceClient,
        input: &str,
    ) -> Result<SubmissionState, SubmitError> {
        let submission = self.begin(store, input)?;
        let result = client.generate(&submission.prompt).await;
        Ok(self.complete(store, submission, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStore;
    use crate::state::THINKING_PLACEHOLDER;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockClient {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl MockClient {
        fn answering(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl InferenceClient for MockClient {
        async fn generate(&self, prompt: &str) -> Result<String, TransportError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => Err(TransportError::Aborted("connection refused".to_string())),
            }
        }
    }

    fn store() -> ChatStore {
        ChatStore::load(Box::new(MemoryStore::new()))
    }

    #[test]
    fn test_submission_scenario() {
        let mut store = store();
        let mut controller = ConversationController::new();

        let submission = controller.begin(&mut store, "How do I hash a password?").unwrap();
        assert_eq!(controller.state(), SubmissionState::AwaitingInference);

        let conversation = store.active().unwrap();
        assert_eq!(conversation.title, "How do I");
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0], ChatMessage::user("How do I hash a password?"));
        assert!(conversation.messages[1].is_thinking);
        assert_eq!(conversation.messages[1].content, THINKING_PLACEHOLDER);

        let outcome = controller.complete(&mut store, submission, Ok("Use bcrypt.".to_string()));
        assert_eq!(outcome, SubmissionState::Resolved);
        assert_eq!(controller.state(), SubmissionState::Idle);

        let answer = &store.active().unwrap().messages[1];
        assert_eq!(answer.content, "Use bcrypt.");
        assert!(!answer.is_thinking);
    }

    #[tokio::test]
    async fn test_network_failure_resolves_to_apology() {
        let mut store = store();
        let mut controller = ConversationController::new();
        let client = MockClient::failing();

        let outcome = controller
            .submit(&mut store, &client, "scan my network")
            .await
            .unwrap();

        assert_eq!(outcome, SubmissionState::Failed);
        assert!(!controller.is_busy());
        assert_eq!(store.conversations().len(), 1);

        let messages = &store.active().unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "scan my network");
        assert_eq!(messages[1].content, INFERENCE_ERROR_MESSAGE);
        assert!(!messages[1].is_thinking);
    }

    #[tokio::test]
    async fn test_successful_submit_is_filtered() {
        let mut store = store();
        let mut controller = ConversationController::new();
        let client = MockClient::answering("Hi, I am SecureGPT and I love nmap.");

        controller.submit(&mut store, &client, "who are you").await.unwrap();
        let messages = &store.active().unwrap().messages;
        assert_eq!(messages[1].content, crate::filter::IDENTITY_RESPONSE);
    }

    #[tokio::test]
    async fn test_filter_can_be_disabled() {
        let mut store = store();
        let mut controller = ConversationController::new().with_filter(false);
        let client = MockClient::answering("I am SecureGPT   ");

        controller.submit(&mut store, &client, "who are you").await.unwrap();
        assert_eq!(store.active().unwrap().messages[1].content, "I am SecureGPT   ");
    }

    #[tokio::test]
    async fn test_prompt_is_wrapped_with_preamble() {
        let mut store = store();
        let mut controller =
            ConversationController::new().with_preamble(Some("You are a security expert.".to_string()));
        let client = MockClient::answering("ok");

        controller.submit(&mut store, &client, "what is XSS?").await.unwrap();
        assert_eq!(
            *client.prompts.lock().unwrap(),
            vec!["You are a security expert. User question: what is XSS?".to_string()]
        );
    }

    #[test]
    fn test_blank_input_is_rejected() {
        let mut store = store();
        let mut controller = ConversationController::new();
        assert_eq!(controller.begin(&mut store, "  \n\t").unwrap_err(), SubmitError::EmptyInput);
        assert!(store.active().unwrap().messages.is_empty());
        assert_eq!(controller.state(), SubmissionState::Idle);
    }

    #[test]
    fn test_second_submission_blocked_while_in_flight() {
        let mut store = store();
        let mut controller = ConversationController::new();

        let first = controller.begin(&mut store, "one").unwrap();
        assert_eq!(controller.begin(&mut store, "two").unwrap_err(), SubmitError::Busy);
        assert_eq!(store.active().unwrap().messages.len(), 2);

        controller.complete(&mut store, first, Ok("done".to_string()));
        assert!(controller.begin(&mut store, "two").is_ok());
    }

    #[test]
    fn test_result_lands_in_submitting_conversation() {
        let mut store = store();
        let mut controller = ConversationController::new();

        let submission = controller.begin(&mut store, "first chat").unwrap();
        let origin = submission.conversation_id.clone();
        let other = store.create_conversation();

        controller.complete(&mut store, submission, Ok("answer".to_string()));

        assert_eq!(store.get(&origin).unwrap().messages[1].content, "answer");
        assert!(store.get(&other).unwrap().messages.is_empty());
    }

    #[test]
    fn test_only_first_user_message_renames() {
        let mut store = store();
        let mut controller = ConversationController::new();

        let s = controller.begin(&mut store, "explain sql injection please").unwrap();
        controller.complete(&mut store, s, Ok("...".to_string()));
        let s = controller.begin(&mut store, "and blind variants").unwrap();
        controller.complete(&mut store, s, Ok("...".to_string()));

        assert_eq!(store.active().unwrap().title, "explain sql injection");
        assert_eq!(store.active().unwrap().messages.len(), 4);
    }

    #[test]
    fn test_submit_after_delete_all_recreates_conversation() {
        let mut store = store();
        let mut controller = ConversationController::new();
        store.delete_all();

        let submission = controller.begin(&mut store, "hello").unwrap();
        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.active_id(), Some(submission.conversation_id.as_str()));
    }
}
