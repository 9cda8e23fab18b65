use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::config::UiConfig;
use crate::submitter::{QuerySubmitter, Submission, ViewState};

const QUIT_COMMAND: &str = ":quit";

/// What a completed block of input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Submit(String),
    Quit,
}

/// Joins lines ending in `\` into one multi-line query. A line ending in
/// `\\` ends the query with a single literal backslash instead.
#[derive(Debug, Default)]
pub struct QueryBuffer {
    lines: Vec<String>,
}

impl QueryBuffer {
    pub fn push_line(&mut self, line: &str) -> Option<Input> {
        let line = line.trim_end_matches(['\r', '\n']);

        if self.lines.is_empty() && line.trim() == QUIT_COMMAND {
            return Some(Input::Quit);
        }

        if let Some(head) = line.strip_suffix("\\\\") {
            self.lines.push(format!("{}\\", head));
            return Some(Input::Submit(std::mem::take(&mut self.lines).join("\n")));
        }

        if let Some(head) = line.strip_suffix('\\') {
            self.lines.push(head.to_string());
            return None;
        }

        self.lines.push(line.to_string());
        Some(Input::Submit(std::mem::take(&mut self.lines).join("\n")))
    }

    pub fn is_continuing(&self) -> bool {
        !self.lines.is_empty()
    }
}

/// Draws the view state as plain text.
pub struct Console<W: Write> {
    out: W,
    ui: UiConfig,
}

impl<W: Write> Console<W> {
    pub fn new(out: W, ui: UiConfig) -> Self {
        Self { out, ui }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn header(&mut self) -> io::Result<()> {
        writeln!(self.out, "== {} ==", self.ui.title)?;
        writeln!(self.out, "{}", self.ui.prompt)?;
        writeln!(
            self.out,
            "(end a line with \\ to continue it, \\\\ for a literal \\, {} to exit)",
            QUIT_COMMAND
        )?;
        self.out.flush()
    }

    pub fn status(&mut self, state: &ViewState) -> io::Result<()> {
        let label = if state.loading { "Loading..." } else { "Submit" };
        writeln!(self.out, "[{}]", label)?;
        self.out.flush()
    }

    pub fn render(&mut self, state: &ViewState) -> io::Result<()> {
        self.status(state)?;
        writeln!(self.out)?;
        writeln!(self.out, "RAG Response")?;
        writeln!(self.out, "{}", state.rag_result)?;
        writeln!(self.out)?;
        writeln!(self.out, "Agent Response")?;
        writeln!(self.out, "{}", state.agent_result)?;
        self.out.flush()
    }

    pub fn prompt(&mut self, continuing: bool) -> io::Result<()> {
        write!(self.out, "{}", if continuing { "... " } else { "> " })?;
        self.out.flush()
    }
}

/// Submit the query currently held by `submitter`, drawing the loading
/// status as soon as the request is issued and the full view once it resolves.
pub async fn submit_and_render<W: Write>(
    submitter: &QuerySubmitter,
    console: &mut Console<W>,
) -> io::Result<Submission> {
    let mut rx = submitter.subscribe();
    let submit = submitter.submit_current();
    tokio::pin!(submit);

    let mut shown_loading = false;
    let submission = loop {
        tokio::select! {
            submission = &mut submit => break submission,
            changed = rx.changed() => {
                if changed.is_err() {
                    continue;
                }
                let state = rx.borrow_and_update().clone();
                if state.loading && !shown_loading {
                    console.status(&state)?;
                    shown_loading = true;
                }
            }
        }
    };

    console.render(&submitter.state())?;
    Ok(submission)
}

/// Submit `query` once and draw the result. Used for command-line queries.
pub async fn run_once<W: Write>(
    submitter: &QuerySubmitter,
    query: impl Into<String>,
    console: &mut Console<W>,
) -> io::Result<Submission> {
    submitter.set_query(query);
    let submission = submit_and_render(submitter, console).await?;
    info!(
        "Request #{} resolved (success={})",
        submission.id,
        submission.is_success()
    );
    Ok(submission)
}

/// Read queries from `input` until EOF or the quit command.
pub async fn run_interactive<R, W>(
    submitter: &QuerySubmitter,
    input: R,
    console: &mut Console<W>,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    console.header()?;
    let mut lines = input.lines();
    let mut buffer = QueryBuffer::default();

    loop {
        console.prompt(buffer.is_continuing())?;
        let Some(line) = lines.next_line().await? else {
            debug!("Input closed");
            break;
        };

        match buffer.push_line(&line) {
            None => continue,
            Some(Input::Quit) => break,
            Some(Input::Submit(query)) => {
                submitter.set_query(query);
                let submission = submit_and_render(submitter, console).await?;
                info!(
                    "Request #{} resolved (success={}, applied={})",
                    submission.id,
                    submission.is_success(),
                    submission.applied
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_submits_immediately() {
        let mut buffer = QueryBuffer::default();
        assert_eq!(
            buffer.push_line("transformer scaling laws\n"),
            Some(Input::Submit("transformer scaling laws".into()))
        );
        assert!(!buffer.is_continuing());
    }

    #[test]
    fn empty_line_submits_empty_query() {
        let mut buffer = QueryBuffer::default();
        assert_eq!(buffer.push_line(""), Some(Input::Submit(String::new())));
    }

    #[test]
    fn backslash_continues_the_query() {
        let mut buffer = QueryBuffer::default();
        assert_eq!(buffer.push_line("compare RAG\\"), None);
        assert!(buffer.is_continuing());
        assert_eq!(buffer.push_line(":quit\\"), None);
        assert_eq!(
            buffer.push_line("and agents"),
            Some(Input::Submit("compare RAG\n:quit\nand agents".into()))
        );
    }

    #[test]
    fn doubled_backslash_is_a_literal_ending() {
        let mut buffer = QueryBuffer::default();
        assert_eq!(
            buffer.push_line("files under C:\\\\"),
            Some(Input::Submit("files under C:\\".into()))
        );
        assert!(!buffer.is_continuing());

        assert_eq!(buffer.push_line("first\\"), None);
        assert_eq!(
            buffer.push_line("then C:\\\\"),
            Some(Input::Submit("first\nthen C:\\".into()))
        );
    }

    #[test]
    fn quit_only_at_start_of_query() {
        let mut buffer = QueryBuffer::default();
        assert_eq!(buffer.push_line("  :quit "), Some(Input::Quit));
    }

    #[test]
    fn render_shows_loading_and_answers() {
        let mut console = Console::new(Vec::new(), UiConfig::default());
        console
            .render(&ViewState {
                query: "q".into(),
                rag_result: "Summary X".into(),
                agent_result: "Plan Y".into(),
                loading: false,
            })
            .unwrap();
        console
            .status(&ViewState {
                loading: true,
                ..ViewState::default()
            })
            .unwrap();

        let text = String::from_utf8(console.into_inner()).unwrap();
        assert_eq!(
            text,
            "[Submit]\n\nRAG Response\nSummary X\n\nAgent Response\nPlan Y\n[Loading...]\n"
        );
    }
}
