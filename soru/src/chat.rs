use crate::gemini::{ChatRequest, GeminiError, SolverBackend};
use crate::solution::ChatTurn;
use crate::workflow::WorkflowError;

/// Follow-up conversation attached to a solved question. Append-only; at
/// most one reply is outstanding at a time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatLog {
    turns: Vec<ChatTurn>,
    pending: bool,
}

impl ChatLog {
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// A reply is outstanding; sending is disabled until it lands.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append the user's message and mark a reply as pending. Returns the
    /// trimmed message to send.
    pub(crate) fn send(&mut self, message: &str) -> Result<String, WorkflowError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(WorkflowError::EmptyMessage);
        }
        if self.pending {
            return Err(WorkflowError::ChatBusy);
        }
        self.turns.push(ChatTurn::user(message));
        self.pending = true;
        Ok(message.to_string())
    }

    /// Land the outstanding reply. A failure becomes an apology turn so the
    /// transcript always alternates.
    pub(crate) fn receive(&mut self, result: Result<String, GeminiError>) {
        let content = match result {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "chat reply failed");
                e.chat_message()
            }
        };
        self.turns.push(ChatTurn::model(content));
        self.pending = false;
    }

    /// Forget an outstanding reply that will never be applied. The turns
    /// are kept.
    pub(crate) fn abandon_pending(&mut self) {
        self.pending = false;
    }
}

/// A chat request bound to the workflow generation it was issued in.
#[derive(Clone, Debug)]
pub struct ChatTicket {
    pub epoch: u64,
    pub request: ChatRequest,
}

impl ChatTicket {
    /// Perform the call. The epoch is handed back for
    /// [`SolveWorkflow::complete_chat`](crate::workflow::SolveWorkflow::complete_chat).
    pub async fn run(self, backend: &dyn SolverBackend) -> (u64, Result<String, GeminiError>) {
        let result = backend.ask(&self.request).await;
        (self.epoch, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solution::ChatRole;

    #[test]
    fn send_appends_trimmed_user_turn() {
        let mut log = ChatLog::default();
        assert_eq!(log.send("  neden?  ").unwrap(), "neden?");
        assert_eq!(log.turns(), &[ChatTurn::user("neden?")]);
        assert!(log.is_pending());
    }

    #[test]
    fn rejects_empty_and_concurrent_sends() {
        let mut log = ChatLog::default();
        assert_eq!(log.send("   "), Err(WorkflowError::EmptyMessage));
        log.send("bir").unwrap();
        assert_eq!(log.send("iki"), Err(WorkflowError::ChatBusy));
        assert_eq!(log.turns().len(), 1);
    }

    #[test]
    fn failure_appends_apology() {
        let mut log = ChatLog::default();
        log.send("soru").unwrap();
        log.receive(Err(GeminiError::MissingText));
        assert!(!log.is_pending());
        let last = &log.turns()[1];
        assert_eq!(last.role, ChatRole::Model);
        assert!(last.content.starts_with("Üzgünüm, bir hata oluştu: "));
    }
}
