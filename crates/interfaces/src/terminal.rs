use crate::traits::{Confirmer, Interface};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;

/// Interface over a line reader and a writer, stdin/stdout by default.
pub struct TerminalInterface<R = BufReader<Stdin>, W = Stdout> {
    reader: Mutex<R>,
    writer: Mutex<W>,
}

impl TerminalInterface {
    pub fn new() -> Self {
        Self::with_io(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl Default for TerminalInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> TerminalInterface<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn with_io(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }

    async fn write_raw(&self, text: &str) {
        let mut writer = self.writer.lock().await;
        let _ = writer.write_all(text.as_bytes()).await;
        let _ = writer.flush().await;
    }

    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<R, W> Interface for TerminalInterface<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn receive_input(&self) -> Option<String> {
        let mut line = String::new();
        match self.reader.lock().await.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()),
            Err(e) => {
                tracing::warn!("Failed to read input: {}", e);
                None
            }
        }
    }

    async fn send_output(&self, message: &str) {
        self.write_raw(&format!("{}\n", message)).await;
    }

    async fn show_status(&self, status: &str) {
        self.send_output(&format!("ℹ️  {}", status)).await;
    }
}

#[async_trait]
impl<R, W> Confirmer for TerminalInterface<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn ask(&self, question: &str) -> bool {
        self.write_raw(&format!("⚠️  {} [y/N]: ", question)).await;
        match self.receive_input().await {
            Some(answer) => matches!(answer.to_lowercase().as_str(), "y" | "yes"),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn scripted(input: &'static str) -> TerminalInterface<BufReader<&'static [u8]>, Vec<u8>> {
        TerminalInterface::with_io(BufReader::new(input.as_bytes()), Vec::new())
    }

    #[tokio::test]
    async fn test_receive_input_trims_and_ends() {
        let term = scripted("  list files  \n");
        assert_eq!(term.receive_input().await.as_deref(), Some("list files"));
        assert_eq!(term.receive_input().await, None);
    }

    #[tokio::test]
    async fn test_ask_accepts_only_yes() {
        let term = scripted("y\nYES\nn\nsure\n");
        assert!(term.ask("Run?").await);
        assert!(term.ask("Run?").await);
        assert!(!term.ask("Run?").await);
        assert!(!term.ask("Run?").await);
        // end of input declines
        assert!(!term.ask("Run?").await);

        let written = String::from_utf8(term.into_writer()).unwrap();
        assert_eq!(written.matches("Run? [y/N]: ").count(), 5);
    }

    #[tokio::test]
    async fn test_cancelled_ask_leaves_next_line_for_input() {
        let (mut keyboard, input) = tokio::io::duplex(64);
        let term = TerminalInterface::with_io(BufReader::new(input), Vec::new());

        let asked = tokio::time::timeout(Duration::from_millis(20), term.ask("Run?")).await;
        assert!(asked.is_err());

        keyboard.write_all(b"ls -la\n").await.unwrap();
        assert_eq!(term.receive_input().await.as_deref(), Some("ls -la"));

        keyboard.write_all(b"y\n").await.unwrap();
        assert!(term.ask("Run?").await);
    }

    #[tokio::test]
    async fn test_send_output_appends_newline() {
        let term = scripted("");
        term.send_output("done").await;
        term.show_status("ready").await;
        let written = String::from_utf8(term.into_writer()).unwrap();
        assert_eq!(written, "done\nℹ️  ready\n");
    }
}
