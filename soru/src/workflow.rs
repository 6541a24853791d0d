//! Per-session solve workflow.
//!
//! One question at a time moves through
//! `Idle → ImageSelected → SubjectSelected → Loading → Solved | Failed`.
//! Every phase carries exactly the data that is valid in it, so a solution
//! can never coexist with an error message and a loading phase can never
//! show stale results.
//!
//! Network calls happen outside the machine: `begin_*` hands out a ticket
//! stamped with the current epoch, the caller runs it, and `complete_*`
//! applies the result only if the epoch still matches. Resetting bumps the
//! epoch so late replies are dropped.

use std::mem;

use crate::chat::{ChatLog, ChatTicket};
use crate::gemini::{ChatRequest, GeminiError, SolveRequest, SolverBackend};
use crate::solution::{AnswerChoice, ChatTurn, ImageHandle, Solution, Subject};

pub const LIKE_ACKNOWLEDGEMENT: &str =
    "Değerlendirmen için teşekkürler! Bu çözüm, gelecekteki sorular için referans olacaktır. ✨";
pub const LOADING_MESSAGE: &str = "Soru analiz ediliyor ve çözüm oluşturuluyor...";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Lütfen önce bir resim yükleyip ders seçin.")]
    MissingInput,
    #[error("Çözüm zaten hazırlanıyor, lütfen bekleyin.")]
    AlreadySolving,
    #[error("Öğretmenin yanıtı bekleniyor.")]
    ChatBusy,
    #[error("Mesaj boş olamaz.")]
    EmptyMessage,
    #[error("{action} is not allowed while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },
}

/// Parameters of one solve attempt, kept so a failed attempt can be retried
/// verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attempt {
    pub answer: AnswerChoice,
    pub correction: Option<String>,
}

/// Feedback affordance shown under a fresh solution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Feedback {
    /// Like / report-error buttons visible.
    Offered,
    /// The correction prompt is open.
    Correcting,
    /// The student liked the solution. The acknowledgement is shown once.
    Liked { acknowledged: bool },
}

#[derive(Clone, Debug, Default)]
pub enum SolvePhase {
    #[default]
    Idle,
    ImageSelected {
        image: ImageHandle,
    },
    SubjectSelected {
        image: ImageHandle,
        subject: Subject,
    },
    Loading {
        image: ImageHandle,
        subject: Subject,
        attempt: Attempt,
        chat: ChatLog,
    },
    Solved {
        image: ImageHandle,
        subject: Subject,
        solution: Solution,
        feedback: Feedback,
        chat: ChatLog,
    },
    Failed {
        image: ImageHandle,
        subject: Subject,
        attempt: Attempt,
        message: String,
        chat: ChatLog,
    },
}

impl SolvePhase {
    pub fn name(&self) -> &'static str {
        match self {
            SolvePhase::Idle => "idle",
            SolvePhase::ImageSelected { .. } => "image selected",
            SolvePhase::SubjectSelected { .. } => "subject selected",
            SolvePhase::Loading { .. } => "loading",
            SolvePhase::Solved { .. } => "solved",
            SolvePhase::Failed { .. } => "failed",
        }
    }

    fn image(&self) -> Option<&ImageHandle> {
        match self {
            SolvePhase::Idle => None,
            SolvePhase::ImageSelected { image }
            | SolvePhase::SubjectSelected { image, .. }
            | SolvePhase::Loading { image, .. }
            | SolvePhase::Solved { image, .. }
            | SolvePhase::Failed { image, .. } => Some(image),
        }
    }

    fn subject(&self) -> Option<Subject> {
        match self {
            SolvePhase::Idle | SolvePhase::ImageSelected { .. } => None,
            SolvePhase::SubjectSelected { subject, .. }
            | SolvePhase::Loading { subject, .. }
            | SolvePhase::Solved { subject, .. }
            | SolvePhase::Failed { subject, .. } => Some(*subject),
        }
    }
}

/// Coarse status, as shown by the UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Whether a completion was applied or discarded as stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Stale,
}

/// A solve request bound to the workflow generation it was issued in.
#[derive(Clone, Debug)]
pub struct SolveTicket {
    pub epoch: u64,
    pub request: SolveRequest,
}

impl SolveTicket {
    pub async fn run(self, backend: &dyn SolverBackend) -> (u64, Result<Solution, GeminiError>) {
        let result = backend.solve(&self.request).await;
        (self.epoch, result)
    }
}

#[derive(Debug, Default)]
pub struct SolveWorkflow {
    phase: SolvePhase,
    epoch: u64,
}

impl SolveWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &SolvePhase {
        &self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn status(&self) -> SolveStatus {
        match self.phase {
            SolvePhase::Loading { .. } => SolveStatus::Loading,
            SolvePhase::Solved { .. } => SolveStatus::Success,
            SolvePhase::Failed { .. } => SolveStatus::Error,
            _ => SolveStatus::Idle,
        }
    }

    pub fn image(&self) -> Option<&ImageHandle> {
        self.phase.image()
    }

    pub fn subject(&self) -> Option<Subject> {
        self.phase.subject()
    }

    pub fn solution(&self) -> Option<&Solution> {
        match &self.phase {
            SolvePhase::Solved { solution, .. } => Some(solution),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.phase {
            SolvePhase::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        match &self.phase {
            SolvePhase::Solved { feedback, .. } => Some(feedback),
            _ => None,
        }
    }

    /// The follow-up transcript. It survives correction re-solves and is
    /// only cleared by `reset` or a new photo.
    pub fn chat(&self) -> Option<&ChatLog> {
        match &self.phase {
            SolvePhase::Loading { chat, .. }
            | SolvePhase::Solved { chat, .. }
            | SolvePhase::Failed { chat, .. } => Some(chat),
            _ => None,
        }
    }

    pub fn chat_turns(&self) -> &[ChatTurn] {
        self.chat().map(ChatLog::turns).unwrap_or_default()
    }

    /// Start over with a new photo. Whatever was in progress is abandoned.
    pub fn select_image(&mut self, image: ImageHandle) {
        self.reset();
        tracing::info!(bytes = image.len(), mime = image.mime_type(), "image selected");
        self.phase = SolvePhase::ImageSelected { image };
    }

    pub fn select_subject(&mut self, subject: Subject) -> Result<(), WorkflowError> {
        match mem::take(&mut self.phase) {
            SolvePhase::ImageSelected { image } | SolvePhase::SubjectSelected { image, .. } => {
                self.phase = SolvePhase::SubjectSelected { image, subject };
                Ok(())
            }
            other => {
                let phase = other.name();
                self.phase = other;
                Err(WorkflowError::InvalidTransition {
                    action: "select_subject",
                    phase,
                })
            }
        }
    }

    /// Validate the inputs and enter `Loading`. Nothing is sent when the
    /// photo or subject is missing.
    pub fn begin_solve(&mut self, answer: AnswerChoice) -> Result<SolveTicket, WorkflowError> {
        if matches!(self.phase, SolvePhase::Loading { .. }) {
            return Err(WorkflowError::AlreadySolving);
        }
        let (Some(image), Some(subject)) = (self.image().cloned(), self.subject()) else {
            return Err(WorkflowError::MissingInput);
        };
        let chat = self.take_chat();
        Ok(self.enter_loading(
            image,
            subject,
            Attempt {
                answer,
                correction: None,
            },
            chat,
        ))
    }

    /// Re-issue a failed attempt with the same answer and correction.
    pub fn retry(&mut self) -> Result<SolveTicket, WorkflowError> {
        match mem::take(&mut self.phase) {
            SolvePhase::Failed {
                image,
                subject,
                attempt,
                chat,
                ..
            } => Ok(self.enter_loading(image, subject, attempt, chat)),
            other => Err(self.restore(other, "retry")),
        }
    }

    pub fn complete_solve(
        &mut self,
        epoch: u64,
        result: Result<Solution, GeminiError>,
    ) -> Completion {
        if epoch != self.epoch || !matches!(self.phase, SolvePhase::Loading { .. }) {
            tracing::debug!(epoch, current = self.epoch, "dropping stale solve result");
            return Completion::Stale;
        }
        let SolvePhase::Loading {
            image,
            subject,
            attempt,
            chat,
        } = mem::take(&mut self.phase)
        else {
            return Completion::Stale;
        };
        self.phase = match result {
            Ok(solution) => {
                tracing::info!(%subject, "solution received");
                SolvePhase::Solved {
                    image,
                    subject,
                    solution,
                    feedback: Feedback::Offered,
                    chat,
                }
            }
            Err(e) => {
                tracing::warn!(%subject, error = %e, "solve failed");
                SolvePhase::Failed {
                    image,
                    subject,
                    attempt,
                    message: e.user_message(),
                    chat,
                }
            }
        };
        Completion::Applied
    }

    /// Mark the solution as helpful. The feedback bar disappears for the
    /// rest of this question.
    pub fn like(&mut self) -> Result<(), WorkflowError> {
        match &mut self.phase {
            SolvePhase::Solved { feedback, .. } if *feedback == Feedback::Offered => {
                *feedback = Feedback::Liked {
                    acknowledged: false,
                };
                tracing::info!("solution liked");
                Ok(())
            }
            other => Err(WorkflowError::InvalidTransition {
                action: "like",
                phase: other.name(),
            }),
        }
    }

    /// One-shot acknowledgement after a like.
    pub fn take_acknowledgement(&mut self) -> Option<&'static str> {
        match &mut self.phase {
            SolvePhase::Solved {
                feedback: Feedback::Liked { acknowledged },
                ..
            } if !*acknowledged => {
                *acknowledged = true;
                Some(LIKE_ACKNOWLEDGEMENT)
            }
            _ => None,
        }
    }

    pub fn request_correction(&mut self) -> Result<(), WorkflowError> {
        self.set_feedback("request_correction", Feedback::Offered, Feedback::Correcting)
    }

    pub fn cancel_correction(&mut self) -> Result<(), WorkflowError> {
        self.set_feedback("cancel_correction", Feedback::Correcting, Feedback::Offered)
    }

    /// Re-solve with the student's correction threaded into a fresh prompt.
    /// The originally chosen answer is not resent.
    pub fn submit_correction(&mut self, text: &str) -> Result<SolveTicket, WorkflowError> {
        let text = text.trim();
        match mem::take(&mut self.phase) {
            SolvePhase::Solved {
                image,
                subject,
                feedback: Feedback::Correcting,
                chat,
                ..
            } if !text.is_empty() => {
                tracing::info!(%subject, "re-solving with correction");
                Ok(self.enter_loading(
                    image,
                    subject,
                    Attempt {
                        answer: AnswerChoice::Unspecified,
                        correction: Some(text.to_string()),
                    },
                    chat,
                ))
            }
            other => Err(self.restore(other, "submit_correction")),
        }
    }

    pub fn begin_chat(&mut self, message: &str) -> Result<ChatTicket, WorkflowError> {
        let epoch = self.epoch;
        match &mut self.phase {
            SolvePhase::Solved {
                image,
                solution,
                chat,
                ..
            } => {
                let message = chat.send(message)?;
                Ok(ChatTicket {
                    epoch,
                    request: ChatRequest {
                        image: image.clone(),
                        solution: solution.clone(),
                        message,
                    },
                })
            }
            other => Err(WorkflowError::InvalidTransition {
                action: "chat",
                phase: other.name(),
            }),
        }
    }

    pub fn complete_chat(&mut self, epoch: u64, result: Result<String, GeminiError>) -> Completion {
        if epoch != self.epoch {
            return Completion::Stale;
        }
        match &mut self.phase {
            SolvePhase::Solved { chat, .. } if chat.is_pending() => {
                chat.receive(result);
                Completion::Applied
            }
            _ => Completion::Stale,
        }
    }

    /// Back to `Idle` from anywhere. Drops the photo and invalidates every
    /// outstanding ticket.
    pub fn reset(&mut self) {
        self.phase = SolvePhase::Idle;
        self.epoch += 1;
    }

    fn enter_loading(
        &mut self,
        image: ImageHandle,
        subject: Subject,
        attempt: Attempt,
        mut chat: ChatLog,
    ) -> SolveTicket {
        // The epoch bump below makes any outstanding reply stale.
        chat.abandon_pending();
        self.epoch += 1;
        let request = SolveRequest {
            image: image.clone(),
            subject,
            answer: attempt.answer,
            correction: attempt.correction.clone(),
        };
        tracing::info!(%subject, answer = attempt.answer.prompt_label(), epoch = self.epoch, "solving");
        self.phase = SolvePhase::Loading {
            image,
            subject,
            attempt,
            chat,
        };
        SolveTicket {
            epoch: self.epoch,
            request,
        }
    }

    fn set_feedback(
        &mut self,
        action: &'static str,
        from: Feedback,
        to: Feedback,
    ) -> Result<(), WorkflowError> {
        match &mut self.phase {
            SolvePhase::Solved { feedback, .. } if *feedback == from => {
                *feedback = to;
                Ok(())
            }
            other => Err(WorkflowError::InvalidTransition {
                action,
                phase: other.name(),
            }),
        }
    }

    fn take_chat(&mut self) -> ChatLog {
        match &mut self.phase {
            SolvePhase::Loading { chat, .. }
            | SolvePhase::Solved { chat, .. }
            | SolvePhase::Failed { chat, .. } => mem::take(chat),
            _ => ChatLog::default(),
        }
    }

    /// Put a taken phase back and report the rejected action.
    fn restore(&mut self, phase: SolvePhase, action: &'static str) -> WorkflowError {
        let name = phase.name();
        self.phase = phase;
        WorkflowError::InvalidTransition {
            action,
            phase: name,
        }
    }
}
