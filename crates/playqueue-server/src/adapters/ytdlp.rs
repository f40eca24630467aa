//! `yt-dlp` process adapters: metadata resolution and audio stream acquisition.

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};

use playqueue_core::{AcquireError, AttemptContext, ResolveError, Resolver, StreamAcquirer, StreamHandle};
use playqueue_types::Item;

use crate::config::ResolverSettings;

/// Subset of `yt-dlp --dump-json` output we care about.
#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: Option<String>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    duration: Option<f64>,
    duration_string: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
}

impl VideoInfo {
    fn into_item(self, fallback_locator: &str) -> Item {
        let locator = self
            .webpage_url
            .or(self.original_url)
            .unwrap_or_else(|| fallback_locator.to_string());
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| locator.clone());
        let duration = self
            .duration_string
            .or_else(|| self.duration.map(|secs| format_duration(secs.max(0.0) as u64)));
        Item {
            title,
            locator,
            duration,
            author: self.uploader.or(self.channel),
            thumbnail: self.thumbnail,
        }
    }
}

/// Resolver and acquirer backed by the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    settings: ResolverSettings,
}

impl YtDlp {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }

    fn user_agent(&self) -> Option<&str> {
        self.settings
            .user_agents
            .choose(&mut rand::rng())
            .map(String::as_str)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.settings.program);
        cmd.args(&self.settings.extra_args);
        if let Some(agent) = self.user_agent() {
            cmd.arg("--user-agent").arg(agent);
        }
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    async fn dump_json(&self, target: &str) -> Result<Item, ResolveError> {
        let output = self
            .command()
            .args(["--dump-json", "--no-playlist", "--skip-download", "--no-warnings"])
            .arg(target)
            .output()
            .await
            .map_err(|err| {
                ResolveError::Upstream(format!("spawn {}: {err}", self.settings.program))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Upstream(failure_message(
                &stderr,
                Some(output.status),
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some(line) = stdout.lines().find(|l| !l.trim().is_empty()) else {
            return Err(ResolveError::NotFound {
                query: target.to_string(),
            });
        };
        let info: VideoInfo = serde_json::from_str(line)
            .map_err(|err| ResolveError::Upstream(format!("parse yt-dlp output: {err}")))?;
        Ok(info.into_item(target))
    }
}

#[async_trait]
impl Resolver for YtDlp {
    async fn search(&self, query: &str) -> Result<Item, ResolveError> {
        let item = self
            .dump_json(&format!("ytsearch1:{query}"))
            .await
            .map_err(|err| match err {
                ResolveError::NotFound { .. } => ResolveError::NotFound {
                    query: query.to_string(),
                },
                other => other,
            })?;
        tracing::debug!(query = %query, title = %item.title, "search resolved");
        Ok(item)
    }

    async fn lookup(&self, locator: &str) -> Result<Item, ResolveError> {
        self.dump_json(locator).await
    }
}

/// Keeps the `yt-dlp` child alive (and kills it on drop) while its stdout is read.
struct ProcessGuard {
    _child: Child,
}

#[async_trait]
impl StreamAcquirer for YtDlp {
    async fn acquire(&self, item: &Item, ctx: AttemptContext) -> Result<StreamHandle, AcquireError> {
        tracing::debug!(
            title = %item.title,
            attempt = ctx.attempt,
            "spawning yt-dlp stream"
        );
        let mut child = self
            .command()
            .args(["-f", "bestaudio/best", "-o", "-", "--quiet", "--no-warnings", "--no-playlist"])
            .arg(&item.locator)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| AcquireError::failed(format!("spawn {}: {err}", self.settings.program)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AcquireError::failed("yt-dlp stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AcquireError::failed("yt-dlp stderr not captured"))?;
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        // The stream only counts as acquired once the first bytes arrive.
        let mut reader = BufReader::new(stdout);
        let has_data = matches!(reader.fill_buf().await, Ok(buf) if !buf.is_empty());
        if has_data {
            return Ok(StreamHandle::new(item.title.clone(), reader)
                .with_guard(ProcessGuard { _child: child }));
        }

        let status = child.wait().await.ok();
        let stderr = stderr_task.await.unwrap_or_default();
        Err(AcquireError::failed(failure_message(&stderr, status)))
    }
}

/// Pick the most useful line out of `yt-dlp` stderr.
fn failure_message(stderr: &str, status: Option<ExitStatus>) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if let Some(error_line) = lines.iter().rev().find(|l| l.starts_with("ERROR")) {
        return error_line.to_string();
    }
    if let Some(last) = lines.last() {
        return last.to_string();
    }
    match status {
        Some(status) => format!("yt-dlp exited with {status} and produced no audio"),
        None => "yt-dlp produced no audio".to_string(),
    }
}

fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
