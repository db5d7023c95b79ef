use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::SaveError;
use crate::merge::merge;

const VERSION_TIMEOUT: Duration = Duration::from_secs(15);
const DECODE_TIMEOUT: Duration = Duration::from_secs(120);
const ENCODE_TIMEOUT: Duration = Duration::from_secs(180);

/// Wrapper around the external binary encoder/decoder subprocess
/// (uesave-style: `to-json` / `from-json`). All invocations carry a bounded
/// timeout; non-zero exit or unparseable output surfaces as [`SaveError`]
/// with captured stderr.
pub struct SaveCodec {
    exe: PathBuf,
}

struct CmdOutput {
    stdout: Vec<u8>,
}

impl SaveCodec {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self { exe: exe.into() }
    }

    /// Prefer a codec binary sitting next to the working directory, falling
    /// back to PATH.
    pub fn locate() -> Self {
        for name in ["uesave.exe", "uesave"] {
            let p = Path::new(name);
            if p.exists() {
                return Self::new(p);
            }
        }
        Self::new("uesave")
    }

    /// Preflight: run `--version` and return its output.
    pub fn ensure_ok(&self) -> Result<String, SaveError> {
        let out = self
            .run(&["--version"], None, VERSION_TIMEOUT)
            .map_err(|e| SaveError::CodecUnavailable {
                detail: e.to_string(),
            })?;
        let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
        debug!(exe = %self.exe.display(), %version, "codec ok");
        Ok(version)
    }

    fn run(
        &self,
        args: &[&str],
        stdin: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<CmdOutput, SaveError> {
        let command = format!(
            "{} {}",
            self.exe.display(),
            args.first().copied().unwrap_or_default()
        );
        let mut child = Command::new(&self.exe)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let out_thread = thread::spawn(move || read_all(stdout_pipe));
        let err_thread = thread::spawn(move || read_all(stderr_pipe));

        // Pump stdin concurrently with the readers: a codec that interleaves
        // reading and writing must never see both pipes full at once. A
        // write failure means the child stopped reading early; the exit
        // status and captured stderr carry the real diagnosis, so the
        // broken-pipe error itself is dropped.
        let in_thread = match (stdin, child.stdin.take()) {
            (Some(bytes), Some(mut pipe)) => {
                let bytes = bytes.to_vec();
                Some(thread::spawn(move || {
                    let _ = pipe.write_all(&bytes);
                    // pipe drops here, closing the child's stdin
                }))
            }
            _ => None,
        };

        let status = wait_with_timeout(&mut child, timeout).ok_or_else(|| {
            SaveError::CodecTimeout {
                command: command.clone(),
                secs: timeout.as_secs(),
            }
        })??;

        if let Some(t) = in_thread {
            let _ = t.join();
        }
        let stdout = out_thread.join().unwrap_or_default();
        let stderr = err_thread.join().unwrap_or_default();

        if !status.success() {
            return Err(SaveError::CodecFailed {
                command,
                status: status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        if !stderr.is_empty() {
            debug!(%command, stderr = %String::from_utf8_lossy(&stderr).trim(), "codec stderr");
        }
        Ok(CmdOutput { stdout })
    }

    /// Decode a binary container into the JSON-like tree.
    pub fn decode_file(&self, path: &Path) -> Result<Value, SaveError> {
        let input = path.to_string_lossy();
        let out = self.run(&["to-json", "--input", &input], None, DECODE_TIMEOUT)?;
        Ok(serde_json::from_slice(&out.stdout)?)
    }

    /// Load either a raw JSON dump or a binary container (via the codec).
    pub fn load_file(&self, path: &Path) -> Result<Value, SaveError> {
        if path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        {
            let data = fs::read_to_string(path)?;
            return Ok(serde_json::from_str(&data)?);
        }
        self.ensure_ok()?;
        self.decode_file(path)
    }

    /// Encode a tree back into binary container bytes.
    pub fn encode(&self, tree: &Value) -> Result<Vec<u8>, SaveError> {
        let payload = serde_json::to_vec(tree)?;
        let out = self.run(&["from-json"], Some(&payload), ENCODE_TIMEOUT)?;
        Ok(out.stdout)
    }

    /// Fetch a fresh baseline from `src`, fold `edited` onto it, encode, and
    /// atomically replace `target`. The in-memory tree the editor mutated is
    /// deliberately not sent to the encoder: only a fresh decode is known to
    /// have encoder-safe container shapes.
    pub fn save_sav(
        &self,
        target: &Path,
        edited: &Value,
        src: &Path,
        mut on_progress: impl FnMut(u8, &str),
    ) -> Result<PathBuf, SaveError> {
        self.ensure_ok()?;

        on_progress(45, "Reading baseline");
        let baseline = self.decode_file(src)?;

        on_progress(55, "Merging changes");
        let merged = merge(&baseline, edited);

        // pretty copy for inspection, not fatal if it fails
        let merged_copy = target.with_extension("merged.json");
        if let Ok(text) = serde_json::to_string_pretty(&merged) {
            let _ = fs::write(&merged_copy, text);
        }

        on_progress(60, "Invoking encoder");
        let bytes = match self.encode(&merged) {
            Ok(b) => b,
            Err(e) => {
                // keep the failing payload around for diagnosis
                let failed_copy = target.with_extension("failed.json");
                if let Ok(text) = serde_json::to_string_pretty(&merged) {
                    let _ = fs::write(&failed_copy, text);
                }
                return Err(e);
            }
        };

        // temp file + rename so a failure never leaves a truncated save
        let tmp = target.with_extension("sav.part");
        fs::write(&tmp, &bytes)?;
        if target.exists() {
            fs::remove_file(target)?;
        }
        fs::rename(&tmp, target)?;

        on_progress(100, "Saved");
        info!(target = %target.display(), bytes = bytes.len(), "save written");
        Ok(target.to_path_buf())
    }
}

fn read_all(pipe: Option<impl Read>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut p) = pipe {
        let _ = p.read_to_end(&mut buf);
    }
    buf
}

/// Poll-wait for the child, killing it once the deadline passes. `None`
/// means timeout.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Option<Result<std::process::ExitStatus, std::io::Error>> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(Ok(status)),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                thread::sleep(Duration::from_millis(25));
            }
            Err(e) => return Some(Err(e)),
        }
    }
}
