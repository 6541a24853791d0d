use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::json;
use soru::{AnswerChoice, Subject};

/// JSONL transcript of one run under `~/.soru/sessions/`.
pub struct SessionLogger {
    file: std::io::BufWriter<std::fs::File>,
    path: PathBuf,
}

impl SessionLogger {
    pub fn new(dir: &Path, model: &str) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)?;

        let now = chrono::Local::now();
        let filename = format!("{}.jsonl", now.format("%Y%m%d_%H%M%S"));
        let path = dir.join(&filename);
        let file = std::io::BufWriter::new(std::fs::File::create(&path)?);

        let mut logger = Self { file, path };
        logger.write_json(&json!({
            "type": "session_start",
            "session_id": uuid::Uuid::new_v4().to_string(),
            "ts": now.to_rfc3339(),
            "model": model,
        }))?;
        Ok(logger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_json(&mut self, value: &serde_json::Value) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.file, value)?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        Ok(())
    }

    fn record(&mut self, kind: &str, mut fields: serde_json::Value) {
        if let serde_json::Value::Object(ref mut map) = fields {
            map.insert("type".into(), kind.into());
            map.insert("ts".into(), chrono::Local::now().to_rfc3339().into());
        }
        if let Err(e) = self.write_json(&fields) {
            tracing::warn!(error = %e, "session log write failed");
        }
    }

    pub fn log_solve_request(
        &mut self,
        subject: Subject,
        answer: AnswerChoice,
        correction: Option<&str>,
        image_bytes: usize,
    ) {
        self.record(
            "solve_request",
            json!({
                "subject": subject.name(),
                "answer": answer.prompt_label(),
                "correction": correction,
                "image_bytes": image_bytes,
            }),
        );
    }

    pub fn log_solve_result(&mut self, outcome: Result<&soru::Solution, String>, elapsed_ms: u64) {
        let fields = match outcome {
            Ok(solution) => json!({ "ok": true, "solution": solution, "elapsed_ms": elapsed_ms }),
            Err(message) => json!({ "ok": false, "error": message, "elapsed_ms": elapsed_ms }),
        };
        self.record("solve_result", fields);
    }

    pub fn log_feedback(&mut self, kind: &str) {
        self.record("feedback", json!({ "kind": kind }));
    }

    pub fn log_chat(&mut self, turn: &soru::ChatTurn) {
        self.record("chat", json!({ "role": turn.role, "content": turn.content }));
    }

    pub fn log_session(&mut self, state: &str, uid: Option<&str>) {
        self.record("session", json!({ "state": state, "uid": uid }));
    }
}
