pub mod auth;
pub mod chat;
pub mod config;
pub mod firebase;
pub mod gate;
pub mod gemini;
pub mod prompt;
pub mod render;
pub mod solution;
pub mod workflow;

// Re-exports
pub use auth::{
    AccountService, Accounts, ApprovalRecord, ApprovalStore, AuthError, Identity,
    IdentityProvider, LoginForm, SessionState, SignupForm, SignupProfile, Subscription,
    friendly_message, resolve_session,
};
pub use chat::{ChatLog, ChatTicket};
pub use config::{SessionFile, SoruConfig};
pub use firebase::{FirebaseAuth, FirestoreApprovals};
pub use gate::SessionGate;
pub use gemini::{ChatRequest, GeminiClient, GeminiError, SolveRequest, SolverBackend};
pub use render::{InlineSpan, RenderFragment};
pub use solution::{AnswerChoice, ChatRole, ChatTurn, ImageHandle, Solution, Subject};
pub use workflow::{
    Completion, Feedback, SolvePhase, SolveStatus, SolveTicket, SolveWorkflow, WorkflowError,
};
