//! HTML to PDF renderers
//!
//! The conversion gate only knows the [`Renderer`] trait. Two implementations
//! ship with the crate:
//! - [`CommandRenderer`] pipes HTML into an external program (weasyprint by
//!   default) and reads the PDF from its stdout.
//! - [`BlockingRenderer`] runs a synchronous rendering function on tokio's
//!   blocking pool.

use async_trait::async_trait;
use bytes::Bytes;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::OwnedSemaphorePermit;

use crate::config::RendererConfig;

/// Errors raised by a renderer
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to run renderer: {0}")]
    Io(#[from] std::io::Error),

    #[error("renderer exited with status {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("renderer produced no output")]
    EmptyOutput,

    #[error("{0}")]
    Engine(String),

    #[error("render task failed: {0}")]
    Join(String),
}

/// Converts one HTML document into PDF bytes
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, html: String) -> Result<Bytes, RenderError>;

    /// Render while occupying `permit`, one slot of the gate's render pool
    ///
    /// The permit must stay held for as long as rendering work runs. The
    /// default holds it for the lifetime of this future, which is enough for
    /// renderers whose work stops when the future is dropped.
    async fn render_with_permit(
        &self,
        html: String,
        permit: OwnedSemaphorePermit,
    ) -> Result<Bytes, RenderError> {
        let _permit = permit;
        self.render(html).await
    }

    /// Hint that the renderer may release memory it holds between requests
    fn reclaim(&self) {}
}

/// Renders by spawning an external program per request
///
/// The child is killed if the render future is dropped, so an abandoned
/// render does not leave a process behind. All rendering memory lives in the
/// child and is returned to the OS when it exits; `reclaim` reports children
/// that are still running.
pub struct CommandRenderer {
    command: String,
    args: Vec<String>,
    live_children: Arc<AtomicUsize>,
}

/// Counts a child process for as long as its render future lives
struct ChildSlot(Arc<AtomicUsize>);

impl ChildSlot {
    fn claim(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for ChildSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CommandRenderer {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            live_children: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Renderer processes currently running
    pub fn live_children(&self) -> usize {
        self.live_children.load(Ordering::SeqCst)
    }

    pub fn from_config(config: &RendererConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(&self, html: String) -> Result<Bytes, RenderError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let _slot = ChildSlot::claim(&self.live_children);

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("renderer stdin was not captured"))?;

        // Feed stdin while collecting stdout, otherwise a large document can
        // fill both pipes and deadlock.
        let input = html.into_bytes();
        let write = async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(
                command = %self.command,
                code = ?output.status.code(),
                stderr = %stderr,
                "Renderer process failed"
            );
            return Err(RenderError::Failed {
                code: output.status.code(),
                stderr,
            });
        }
        if output.stdout.is_empty() {
            return Err(RenderError::EmptyOutput);
        }
        // A renderer may exit before draining stdin once it has what it needs
        if let Err(e) = written {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(e.into());
            }
        }
        Ok(Bytes::from(output.stdout))
    }

    fn reclaim(&self) {
        let live = self.live_children();
        if live > 0 {
            tracing::debug!(command = %self.command, live_children = live, "Renderer processes still running");
        }
    }
}

type RenderFn = dyn Fn(&str) -> Result<Vec<u8>, String> + Send + Sync;

/// Runs a synchronous rendering function on the blocking pool
///
/// A blocking call cannot be interrupted; if the caller gives up, the
/// function still runs to completion and its result is discarded. The render
/// pool permit moves onto the blocking thread, so an abandoned call keeps its
/// slot until it actually finishes.
pub struct BlockingRenderer {
    render_fn: Arc<RenderFn>,
}

impl BlockingRenderer {
    pub fn new<F>(render_fn: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<u8>, String> + Send + Sync + 'static,
    {
        Self {
            render_fn: Arc::new(render_fn),
        }
    }

    async fn run(
        &self,
        html: String,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Result<Bytes, RenderError> {
        let render_fn = Arc::clone(&self.render_fn);
        let pdf = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            render_fn(&html)
        })
        .await
        .map_err(|e| RenderError::Join(e.to_string()))?
        .map_err(RenderError::Engine)?;
        Ok(Bytes::from(pdf))
    }
}

#[async_trait]
impl Renderer for BlockingRenderer {
    async fn render(&self, html: String) -> Result<Bytes, RenderError> {
        self.run(html, None).await
    }

    async fn render_with_permit(
        &self,
        html: String,
        permit: OwnedSemaphorePermit,
    ) -> Result<Bytes, RenderError> {
        self.run(html, Some(permit)).await
    }
}
