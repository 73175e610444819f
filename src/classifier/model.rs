//! Entity-recognition model collaborators.
//!
//! The classifier only needs labelled char ranges from a model. Three
//! implementations are provided: no model at all, a gazetteer loaded from
//! TOML, and an external process speaking JSON lines on stdin/stdout.

use crate::domain::{char_range, PiiCategory};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use crate::runtime;
use std::path::Path;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// Failure of an entity model call.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("model I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("model gave no reply within {after:?}")]
    Timeout { after: Duration },

    #[error("malformed model output: {0}")]
    Malformed(String),

    #[error("invalid lexicon: {0}")]
    Lexicon(String),
}

/// One labelled range returned by a model, in char offsets of the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntity {
    pub label: String,
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_score")]
    pub score: f32,
}

fn default_score() -> f32 {
    1.0
}

impl ModelEntity {
    pub fn category(&self) -> Option<PiiCategory> {
        PiiCategory::from_model_label(&self.label)
    }
}

/// Labels spans of free text with semantic categories.
pub trait EntityModel: Send + Sync {
    fn classify(&self, text: &str) -> Result<Vec<ModelEntity>, DetectionError>;

    fn name(&self) -> &str;
}

/// Pattern-only operation.
#[derive(Debug, Clone, Default)]
pub struct NullEntityModel;

impl EntityModel for NullEntityModel {
    fn classify(&self, _text: &str) -> Result<Vec<ModelEntity>, DetectionError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "none"
    }
}

#[derive(Debug, Deserialize)]
struct LexiconFile {
    #[serde(default, rename = "entry")]
    entries: Vec<LexiconEntry>,
}

#[derive(Debug, Deserialize)]
struct LexiconEntry {
    label: String,
    terms: Vec<String>,
}

/// Case-insensitive whole-word gazetteer.
///
/// ```toml
/// [[entry]]
/// label = "NOM"
/// terms = ["Dupont", "Martin"]
/// ```
#[derive(Debug, Clone)]
pub struct LexiconEntityModel {
    entries: Vec<(String, Regex)>,
}

impl LexiconEntityModel {
    pub fn from_toml_str(content: &str) -> Result<Self, DetectionError> {
        let file: LexiconFile =
            toml::from_str(content).map_err(|e| DetectionError::Lexicon(e.to_string()))?;
        let mut entries = Vec::with_capacity(file.entries.len());
        for entry in file.entries {
            let terms: Vec<String> = entry
                .terms
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(regex::escape)
                .collect();
            if terms.is_empty() {
                continue;
            }
            let regex = RegexBuilder::new(&format!(r"\b(?:{})\b", terms.join("|")))
                .case_insensitive(true)
                .build()
                .map_err(|e| DetectionError::Lexicon(e.to_string()))?;
            entries.push((entry.label.to_uppercase(), regex));
        }
        Ok(Self { entries })
    }

    pub fn from_path(path: &Path) -> Result<Self, DetectionError> {
        let content = std::fs::read_to_string(path)?;
        let model = Self::from_toml_str(&content)?;
        info!(path = %path.display(), labels = model.entries.len(), "Loaded lexicon model");
        Ok(model)
    }
}

impl EntityModel for LexiconEntityModel {
    fn classify(&self, text: &str) -> Result<Vec<ModelEntity>, DetectionError> {
        let mut found = Vec::new();
        for (label, regex) in &self.entries {
            for m in regex.find_iter(text) {
                let range = char_range(text, m.range());
                found.push(ModelEntity {
                    label: label.clone(),
                    start: range.start,
                    end: range.end,
                    text: m.as_str().to_string(),
                    score: 1.0,
                });
            }
        }
        found.sort_by_key(|e| e.start);
        Ok(found)
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}

struct ModelProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ModelProcess {
    /// Writes one request line and reads one reply line; `None` once the
    /// process closed its output.
    async fn exchange(&mut self, request: &str) -> std::io::Result<Option<String>> {
        self.stdin.write_all(request.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;

        let mut line = String::new();
        if self.stdout.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

#[derive(Serialize)]
struct ModelRequest<'a> {
    text: &'a str,
}

/// Default deadline for one model reply.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(30);

/// Long-running model process.
///
/// Each request is one JSON line `{"text": ...}`; the reply is one JSON
/// line holding an array of [`ModelEntity`]. A reply that misses the
/// deadline, or any I/O failure, kills the process and starts a fresh one
/// for the next request.
pub struct CommandEntityModel {
    command_line: Vec<String>,
    timeout: Duration,
    runtime: Option<Runtime>,
    process: Mutex<Option<ModelProcess>>,
}

impl CommandEntityModel {
    /// Spawns `program args...` with piped stdin/stdout.
    pub fn spawn(command_line: &[String]) -> Result<Self, DetectionError> {
        if command_line.is_empty() {
            return Err(DetectionError::Unavailable("empty model command".to_string()));
        }
        let runtime = runtime::current_thread()
            .map_err(|e| DetectionError::Unavailable(format!("cannot start model runtime: {}", e)))?;
        let process = start(&runtime, command_line)?;
        info!(command = %command_line[0], "Started entity model process");
        Ok(Self {
            command_line: command_line.to_vec(),
            timeout: DEFAULT_MODEL_TIMEOUT,
            runtime: Some(runtime),
            process: Mutex::new(Some(process)),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn runtime(&self) -> Result<&Runtime, DetectionError> {
        self.runtime
            .as_ref()
            .ok_or_else(|| DetectionError::Unavailable("model runtime stopped".to_string()))
    }

    /// Kills the current process and tries to start its replacement.
    fn restart(&self, slot: &mut Option<ModelProcess>) {
        let Ok(runtime) = self.runtime() else {
            return;
        };
        if let Some(mut old) = slot.take() {
            let _ = runtime::block_on(runtime, old.child.kill());
        }
        match start(runtime, &self.command_line) {
            Ok(process) => {
                info!(command = %self.command_line[0], "Restarted entity model process");
                *slot = Some(process);
            }
            Err(e) => warn!(error = %e, "Entity model process could not be restarted"),
        }
    }
}

fn start(runtime: &Runtime, command_line: &[String]) -> Result<ModelProcess, DetectionError> {
    let (program, args) = command_line
        .split_first()
        .ok_or_else(|| DetectionError::Unavailable("empty model command".to_string()))?;

    let _context = runtime.enter();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DetectionError::Unavailable(format!("{}: {}", program, e)))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| DetectionError::Unavailable("model stdin not captured".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| DetectionError::Unavailable("model stdout not captured".to_string()))?;
    Ok(ModelProcess {
        child,
        stdin,
        stdout: BufReader::new(stdout),
    })
}

impl EntityModel for CommandEntityModel {
    fn classify(&self, text: &str) -> Result<Vec<ModelEntity>, DetectionError> {
        let runtime = self.runtime()?;
        let mut slot = self
            .process
            .lock()
            .map_err(|_| DetectionError::Unavailable("model process lock poisoned".to_string()))?;
        if slot.is_none() {
            self.restart(&mut slot);
        }
        let process = slot.as_mut().ok_or_else(|| {
            DetectionError::Unavailable(format!("{} is not running", self.command_line[0]))
        })?;

        let request = serde_json::to_string(&ModelRequest { text })
            .map_err(|e| DetectionError::Malformed(e.to_string()))?;
        let timeout = self.timeout;
        let reply = runtime::block_on(runtime, async move {
            tokio::time::timeout(timeout, process.exchange(&request)).await
        });

        let line = match reply {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => {
                self.restart(&mut slot);
                return Err(DetectionError::Unavailable(format!(
                    "{} closed its output",
                    self.command_line[0]
                )));
            }
            Ok(Err(e)) => {
                self.restart(&mut slot);
                return Err(DetectionError::Io(e));
            }
            Err(_) => {
                warn!(after_s = self.timeout.as_secs_f32(), "Entity model timed out");
                self.restart(&mut slot);
                return Err(DetectionError::Timeout {
                    after: self.timeout,
                });
            }
        };
        let entities: Vec<ModelEntity> =
            serde_json::from_str(line.trim()).map_err(|e| DetectionError::Malformed(e.to_string()))?;
        debug!(count = entities.len(), "Model reply");
        Ok(entities)
    }

    fn name(&self) -> &str {
        "command"
    }
}

impl Drop for CommandEntityModel {
    fn drop(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        if let Ok(slot) = self.process.get_mut() {
            if let Some(mut process) = slot.take() {
                let _ = runtime::block_on(&runtime, process.child.kill());
            }
        }
        runtime::shutdown(runtime);
    }
}
