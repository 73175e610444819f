//! `ocrmypdf` command-line engine.

use super::{OcrEngine, OcrError, OcrOptions};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Spawns `ocrmypdf` in a process group of its own. The whole group is
/// killed when the future is dropped, so the worker's timeout also stops the
/// tesseract and ghostscript workers it started.
#[derive(Debug, Clone)]
pub struct OcrMyPdfEngine {
    program: String,
}

impl OcrMyPdfEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments for one run.
    pub fn arguments(input: &Path, output: &Path, language: &str, options: &OcrOptions) -> Vec<String> {
        let mut args = vec!["-l".to_string(), language.to_string()];
        if options.deskew {
            args.push("--deskew".into());
        }
        if options.force_ocr {
            args.push("--force-ocr".into());
        }
        if options.rotate_pages {
            args.push("--rotate-pages".into());
        }
        if options.remove_background {
            args.push("--remove-background".into());
        }
        args.push("--optimize".into());
        args.push(options.optimize.to_string());
        args.push(input.display().to_string());
        args.push(output.display().to_string());
        args
    }
}

impl Default for OcrMyPdfEngine {
    fn default() -> Self {
        Self::new("ocrmypdf")
    }
}

#[async_trait]
impl OcrEngine for OcrMyPdfEngine {
    async fn ocr(
        &self,
        input: &Path,
        output: &Path,
        language: &str,
        options: &OcrOptions,
    ) -> Result<(), OcrError> {
        let args = Self::arguments(input, output, language, options);
        debug!(program = %self.program, ?args, "Spawning OCR process");

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        let child = command.spawn().map_err(|source| OcrError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let _group = ProcessGroup { leader: child.id() };
        let result = child.wait_with_output().await?;
        if result.status.success() {
            Ok(())
        } else {
            Err(OcrError::Exit {
                program: self.program.clone(),
                code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            })
        }
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Kills the process group led by the engine when dropped.
struct ProcessGroup {
    leader: Option<u32>,
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(leader) = self.leader {
            kill_group(leader);
        }
    }
}

#[cfg(unix)]
fn kill_group(leader: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(pgid) = i32::try_from(leader) else {
        return;
    };
    // ESRCH once every member has exited.
    if killpg(Pid::from_raw(pgid), Signal::SIGKILL).is_ok() {
        debug!(pgid, "Killed OCR process group");
    }
}

#[cfg(not(unix))]
fn kill_group(_leader: u32) {}
