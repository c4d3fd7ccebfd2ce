// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Driver for the ColdFire dBUG monitor's network download.
//!
//! The monitor is woken with a newline, told to fetch the kernel over TFTP
//! with `dn`, then started with `go`.  While downloading, dBUG draws a
//! spinner with backspaces, which is reproduced on the console.

use std::io::{self, ErrorKind, Read, Write};

use crate::LinkError;

pub const PROMPT: &str = "dBUG> ";

const BACKSPACE: u8 = 0x08;

/// A session with dBUG over a serial port (or any other stream).
pub struct DbugSession<P: Read + Write> {
    port: P,
    echo: bool,
}

impl<P: Read + Write> DbugSession<P> {
    pub fn new(port: P) -> Self {
        Self { port, echo: true }
    }

    /// Stops monitor output from being copied to the console.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    fn console(&self, text: &str) -> Result<(), LinkError> {
        if self.echo {
            let mut stdout = io::stdout();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        log::debug!("dBUG <- {}", line);
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()?;
        Ok(())
    }

    /// Collects monitor output until it ends with `prompt`, or the port has
    /// nothing more to give.  Completed lines are printed and discarded, so
    /// what is returned is the final, incomplete, line.
    pub fn read_response(&mut self, prompt: &str) -> Result<String, LinkError> {
        let mut output = String::new();
        let mut buf = [0u8; 256];
        loop {
            let len = match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(len) => len,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            for &byte in &buf[..len] {
                if byte == BACKSPACE {
                    // Redraw the character being erased, then back up over it
                    if let Some(c) = output.pop() {
                        self.console(&c.to_string())?;
                    }
                    self.console("\x08")?;
                    continue;
                }

                output.push(byte as char);
                if byte == b'\n' {
                    let line = output.trim_end_matches(['\r', '\n']);
                    log::debug!("dBUG -> {}", line);
                    self.console(&format!("{line}\n"))?;
                    output.clear();
                }
            }

            if output.ends_with(prompt) {
                break;
            }
        }
        Ok(output)
    }

    pub fn wait_prompt(&mut self, prompt: &str) -> Result<(), LinkError> {
        if self.read_response(prompt)?.ends_with(prompt) {
            Ok(())
        } else {
            Err(LinkError::NoPrompt(prompt.to_string()))
        }
    }

    /// Wakes the monitor up.
    pub fn attention(&mut self) -> Result<(), LinkError> {
        self.write_line("")?;
        self.wait_prompt(PROMPT)
    }

    /// Downloads `filename` from the monitor's configured TFTP server.
    pub fn download(&mut self, filename: &str) -> Result<(), LinkError> {
        self.write_line(&format!("dn {filename}"))?;
        self.wait_prompt(PROMPT)
    }

    /// Starts execution.  No response is expected.
    pub fn go(&mut self, address: &str) -> Result<(), LinkError> {
        self.write_line(&format!("go {address}"))
    }

    /// The whole sequence: wake, download, go.
    pub fn run(&mut self, filename: &str, address: &str) -> Result<(), LinkError> {
        self.attention()?;
        self.download(filename)?;
        self.go(address)
    }

    pub fn into_inner(self) -> P {
        self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openocd::tests::MockStream;

    #[test]
    fn test_prompt_found() {
        let port = MockStream::with_reads(&[b"\r\nColdFire dBUG\r\n", b"dBU", b"G> "]);
        let mut session = DbugSession::new(port).quiet();
        assert_eq!(session.read_response(PROMPT).unwrap(), "dBUG> ");
    }

    #[test]
    fn test_spinner_erases() {
        let port = MockStream::with_reads(&[
            b"Downloading |\x08/\x08-\x08\\\x08done\r\n",
            b"dBUG> ",
        ]);
        let mut session = DbugSession::new(port).quiet();
        session.wait_prompt(PROMPT).unwrap();
    }

    #[test]
    fn test_partial_line_returned() {
        let port = MockStream::with_reads(&[b"line one\nabc\x08d"]);
        let mut session = DbugSession::new(port).quiet();
        assert_eq!(session.read_response(PROMPT).unwrap(), "abd");
    }

    #[test]
    fn test_no_prompt() {
        let port = MockStream::with_reads(&[b"garbage"]);
        let mut session = DbugSession::new(port).quiet();
        assert!(matches!(
            session.wait_prompt(PROMPT),
            Err(LinkError::NoPrompt(_))
        ));
    }

    #[test]
    fn test_run_sequence() {
        let port = MockStream::with_reads(&[
            b"dBUG> ",
            b"Address:  0x00020000\r\nBytes Transferred: 4096\r\ndBUG> ",
        ]);
        let mut session = DbugSession::new(port).quiet();
        session.run("kernel.elf", "0x20000").unwrap();
        assert_eq!(session.into_inner().written, b"\ndn kernel.elf\ngo 0x20000\n");
    }

    #[test]
    fn test_download_fails_without_prompt() {
        let port = MockStream::with_reads(&[b"dBUG> ", b"Error: TFTP timeout\r\n"]);
        let mut session = DbugSession::new(port).quiet();
        assert!(session.run("kernel.elf", "0x20000").is_err());
        assert_eq!(session.into_inner().written, b"\ndn kernel.elf\n");
    }
}
