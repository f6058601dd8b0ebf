//! Conversation session: owns one learner's transcript and mediates
//! every outbound completion request.

use crate::extract::ExtractedUpload;
use crate::llm::{CompletionClient, GenerationError, GenerationOptions};
use crate::models::{Message, MessageRole, RequestMessage, Usage};
use crate::prompt::{SYSTEM_PROMPT, WORKSHEET_HEADING};
use crate::transcript::TranscriptStore;

/// A successful turn: the appended assistant message plus the
/// provider's token accounting.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub message: Message,
    pub usage: Usage,
}

/// One authenticated learner's running conversation.
///
/// The transcript is append-only within a session; after every
/// successful turn the persisted file equals the in-memory state.
pub struct ConversationSession {
    username: String,
    transcript: Vec<Message>,
    pending_upload: Option<ExtractedUpload>,
    store: TranscriptStore,
}

impl ConversationSession {
    /// Open a session, loading the most recently persisted transcript
    /// for this user (empty if none or unreadable).
    pub fn load(store: TranscriptStore, username: &str) -> Self {
        let transcript = store.load(username);
        tracing::debug!(user = %username, messages = transcript.len(), "session loaded");
        Self {
            username: username.to_string(),
            transcript,
            pending_upload: None,
            store,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Append a user turn. Empty text is allowed only alongside an
    /// upload; called with neither, this is a tolerated no-op.
    pub fn append_user_turn(&mut self, text: &str, upload: Option<ExtractedUpload>) {
        let text = text.trim();
        if text.is_empty() && upload.is_none() {
            return;
        }
        self.transcript.push(Message::user(text));
        self.pending_upload = upload;
    }

    /// Assemble the provider-bound message list: the fixed instruction
    /// first, then the full transcript in order, then the pending
    /// upload as one extra user entry.
    pub fn build_request(&self) -> Vec<RequestMessage> {
        let mut request = Vec::with_capacity(self.transcript.len() + 2);
        request.push(RequestMessage::text(MessageRole::System, SYSTEM_PROMPT));

        for msg in &self.transcript {
            request.push(RequestMessage::text(msg.role, msg.content.clone()));
        }

        match &self.pending_upload {
            Some(ExtractedUpload::Document { text }) => {
                request.push(RequestMessage::text(
                    MessageRole::User,
                    format!("{WORKSHEET_HEADING}\n{text}"),
                ));
            }
            Some(ExtractedUpload::Image(img)) => {
                request.push(RequestMessage {
                    role: MessageRole::User,
                    text: String::new(),
                    image: Some(img.clone()),
                });
            }
            None => {}
        }

        request
    }

    /// Run one turn against the completion client.
    ///
    /// On success the assistant reply is appended and the whole
    /// transcript persisted. On failure nothing is appended or
    /// persisted; the caller reports the error and the learner retries
    /// with a fresh turn. The pending upload is consumed either way;
    /// it belongs to this turn only.
    pub fn submit(
        &mut self,
        client: &dyn CompletionClient,
        options: &GenerationOptions,
    ) -> Result<TurnOutcome, GenerationError> {
        let request = self.build_request();
        let result = client.generate(&request, options);
        self.pending_upload = None;

        let completion = result?;

        let message = Message::assistant(completion.text);
        self.transcript.push(message.clone());

        if let Err(e) = self.store.save(&self.username, &self.transcript) {
            // Keep the invariant: what the learner will see on reload
            // must match what we report as recorded.
            self.transcript.pop();
            return Err(e.into());
        }

        tracing::info!(
            user = %self.username,
            messages = self.transcript.len(),
            total_units = completion.usage.total_units,
            "turn recorded"
        );

        Ok(TurnOutcome {
            message,
            usage: completion.usage,
        })
    }

    /// Clear the transcript and persist the empty state immediately,
    /// so a concurrent reload observes no stale history.
    pub fn reset(&mut self) -> Result<(), GenerationError> {
        self.transcript.clear();
        self.pending_upload = None;
        self.store.save(&self.username, &self.transcript)?;
        tracing::info!(user = %self.username, "transcript reset");
        Ok(())
    }
}
