// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! OpenOCD Tcl RPC client.
//!
//! The Tcl RPC server (port 6666 by default) takes commands terminated by
//! `0x1A` and answers with the command output, also terminated by `0x1A`.
//!
//! [`Download`] drives the SweetAda download sequence over a session: the
//! board configuration scripts read the `sweetada_elf`, `start_address`,
//! `debug_mode`, `noload_flag` and `noexec_flag` variables, then the image
//! is loaded and the target resumed.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::LinkError;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6666;

/// Terminates both commands and responses.
pub const SENTINEL: u8 = 0x1A;

const READ_CHUNK: usize = 4096;

/// Whether responses are copied to stdout as they arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Echo {
    Silent,
    Stdout,
}

/// A session with an OpenOCD Tcl RPC server.
pub struct RpcSession<S: Read + Write> {
    stream: S,
}

impl RpcSession<TcpStream> {
    pub fn connect(host: &str, port: u16) -> Result<Self, LinkError> {
        let address = format!("{host}:{port}");
        let stream = TcpStream::connect(&address).map_err(|source| LinkError::Connect {
            address: address.clone(),
            source,
        })?;
        log::debug!("Connected to OpenOCD at {}", address);
        Ok(Self::from_stream(stream))
    }

    /// Shuts the connection down.
    pub fn disconnect(self) -> Result<(), LinkError> {
        let mut stream = self.stream;
        stream.flush()?;
        match stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // The server may already have gone, e.g. after `shutdown`.
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl<S: Read + Write> RpcSession<S> {
    pub fn from_stream(stream: S) -> Self {
        Self { stream }
    }

    pub fn send(&mut self, command: &str) -> Result<(), LinkError> {
        log::debug!("OpenOCD <- {}", command);
        self.stream.write_all(command.as_bytes())?;
        self.stream.write_all(&[SENTINEL])?;
        self.stream.flush()?;
        Ok(())
    }

    /// Reads until a chunk ends with the sentinel, which is stripped.
    pub fn receive(&mut self, echo: Echo) -> Result<Vec<u8>, LinkError> {
        let mut response = Vec::new();
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let len = match self.stream.read(&mut buf) {
                Ok(0) => return Err(LinkError::ConnectionClosed),
                Ok(len) => len,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            let chunk = &buf[..len];
            let (data, done) = match chunk.split_last() {
                Some((&SENTINEL, rest)) => (rest, true),
                _ => (chunk, false),
            };

            if echo == Echo::Stdout {
                let mut stdout = io::stdout();
                stdout.write_all(String::from_utf8_lossy(data).as_bytes())?;
                stdout.flush()?;
            }
            response.extend_from_slice(data);

            if done {
                break;
            }
        }
        log::debug!("OpenOCD -> {}", String::from_utf8_lossy(&response));
        Ok(response)
    }

    pub fn command(&mut self, command: &str, echo: Echo) -> Result<Vec<u8>, LinkError> {
        self.send(command)?;
        self.receive(echo)
    }

    /// Ends the session, dropping the stream.
    pub fn close(mut self) -> Result<(), LinkError> {
        self.stream.flush()?;
        Ok(())
    }
}

/// One step of a download sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Command(String),
    Settle(Duration),
}

/// Parameters of the download sequence.
#[derive(Debug, Clone, Default)]
pub struct Download {
    pub elf: String,

    /// Either a `0x` address or a symbol the configuration script resolves
    pub start_address: String,
    pub debug: bool,
    pub noload: bool,
    pub noexec: bool,
    pub command_file: Option<String>,
    pub commands: Vec<String>,

    /// Target specific commands run before loading
    pub pre_load: Vec<String>,

    /// Pause after the pre-load commands
    pub settle: Option<Duration>,

    /// Target specific commands run last
    pub post_load: Vec<String>,
}

fn flag(value: bool) -> u8 {
    if value { 1 } else { 0 }
}

impl Download {
    /// Debug mode never resumes the target.
    pub fn noexec(&self) -> bool {
        self.noexec || self.debug
    }

    /// Splits a `;` separated list of commands, dropping empty entries.
    pub fn split_commands(list: &str) -> Vec<String> {
        list.split(';')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// The sequence of steps to run against the server.
    pub fn steps(&self) -> Vec<Step> {
        let mut steps = vec![
            format!("set sweetada_elf \"{}\" ; list", self.elf),
            format!("set start_address {} ; list", self.start_address),
            format!("set debug_mode {} ; list", flag(self.debug)),
            format!("set noload_flag {} ; list", flag(self.noload)),
            format!("set noexec_flag {} ; list", flag(self.noexec())),
        ]
        .into_iter()
        .map(Step::Command)
        .collect::<Vec<_>>();

        if let Some(file) = &self.command_file {
            steps.push(Step::Command(format!("source \"{file}\"")));
        }
        steps.extend(self.commands.iter().cloned().map(Step::Command));

        steps.extend(self.pre_load.iter().cloned().map(Step::Command));
        if let Some(settle) = self.settle {
            steps.push(Step::Settle(settle));
        }

        if !self.noload {
            steps.push(Step::Command(format!("load_image \"{}\"", self.elf)));
        }
        if !self.noexec() {
            steps.push(Step::Command(format!("resume {}", self.start_address)));
        }
        steps.extend(self.post_load.iter().cloned().map(Step::Command));

        steps
    }

    /// Runs the sequence, echoing every response.
    pub fn run<S: Read + Write>(
        &self,
        session: &mut RpcSession<S>,
        echo: Echo,
    ) -> Result<(), LinkError> {
        for step in self.steps() {
            match step {
                Step::Command(command) => {
                    session.command(&command, echo)?;
                }
                Step::Settle(duration) => std::thread::sleep(duration),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// In-memory transport: reads are served from scripted chunks, writes
    /// are captured.
    #[derive(Default)]
    pub(crate) struct MockStream {
        pub reads: VecDeque<Vec<u8>>,
        pub written: Vec<u8>,
    }

    impl MockStream {
        pub fn with_reads(reads: &[&[u8]]) -> Self {
            Self {
                reads: reads.iter().map(|r| r.to_vec()).collect(),
                written: Vec::new(),
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(chunk) => {
                    let len = chunk.len().min(buf.len());
                    buf[..len].copy_from_slice(&chunk[..len]);
                    Ok(len)
                }
                None => Ok(0),
            }
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_receive_strips_sentinel() {
        let mut session = RpcSession::from_stream(MockStream::with_reads(&[b"OK\x1a"]));
        assert_eq!(session.receive(Echo::Silent).unwrap(), b"OK");
    }

    #[test]
    fn test_receive_joins_chunks() {
        let mut session = RpcSession::from_stream(MockStream::with_reads(&[
            b"target halted ",
            b"due to debug-request",
            b"\n\x1a",
        ]));
        assert_eq!(
            session.receive(Echo::Silent).unwrap(),
            b"target halted due to debug-request\n"
        );
    }

    #[test]
    fn test_receive_empty_response() {
        let mut session = RpcSession::from_stream(MockStream::with_reads(&[b"\x1a"]));
        assert!(session.receive(Echo::Silent).unwrap().is_empty());
    }

    #[test]
    fn test_receive_closed() {
        let mut session = RpcSession::from_stream(MockStream::with_reads(&[b"partial"]));
        assert!(matches!(
            session.receive(Echo::Silent),
            Err(LinkError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_send_appends_sentinel() {
        let mut session = RpcSession::from_stream(MockStream::default());
        session.send("reset halt").unwrap();
        session.send("shutdown").unwrap();
        assert_eq!(session.stream.written, b"reset halt\x1ashutdown\x1a");
    }

    #[test]
    fn test_command() {
        let mut session = RpcSession::from_stream(MockStream::with_reads(&[b"0x1000\x1a"]));
        let response = session.command("set start_address 0x1000 ; list", Echo::Silent);
        assert_eq!(response.unwrap(), b"0x1000");
        assert_eq!(
            session.stream.written,
            b"set start_address 0x1000 ; list\x1a"
        );
        session.close().unwrap();
    }

    fn commands(steps: &[Step]) -> Vec<&str> {
        steps
            .iter()
            .filter_map(|s| match s {
                Step::Command(c) => Some(c.as_str()),
                Step::Settle(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_download_steps() {
        let download = Download {
            elf: "kernel.o".to_string(),
            start_address: "0x8000".to_string(),
            command_file: Some("board.tcl".to_string()),
            commands: Download::split_commands("reset halt; ;flash probe 0"),
            ..Default::default()
        };
        let steps = download.steps();
        assert_eq!(
            commands(&steps),
            vec![
                "set sweetada_elf \"kernel.o\" ; list",
                "set start_address 0x8000 ; list",
                "set debug_mode 0 ; list",
                "set noload_flag 0 ; list",
                "set noexec_flag 0 ; list",
                "source \"board.tcl\"",
                "reset halt",
                "flash probe 0",
                "load_image \"kernel.o\"",
                "resume 0x8000",
            ]
        );
    }

    #[test]
    fn test_debug_implies_noexec() {
        let download = Download {
            elf: "kernel.o".to_string(),
            start_address: "_start".to_string(),
            debug: true,
            ..Default::default()
        };
        let steps = download.steps();
        let commands = commands(&steps);
        assert!(commands.contains(&"set debug_mode 1 ; list"));
        assert!(commands.contains(&"set noexec_flag 1 ; list"));
        assert_eq!(commands.last(), Some(&"load_image \"kernel.o\""));
    }

    #[test]
    fn test_profile_steps() {
        let download = Download {
            elf: "kernel.o".to_string(),
            start_address: "0x0".to_string(),
            noload: true,
            pre_load: vec!["targets r5.cpu0".to_string(), "halt".to_string()],
            settle: Some(Duration::from_millis(100)),
            post_load: vec!["targets a53.cpu0".to_string()],
            ..Default::default()
        };
        let steps = download.steps();
        let tail = &steps[5..];
        assert_eq!(
            tail,
            &[
                Step::Command("targets r5.cpu0".to_string()),
                Step::Command("halt".to_string()),
                Step::Settle(Duration::from_millis(100)),
                Step::Command("resume 0x0".to_string()),
                Step::Command("targets a53.cpu0".to_string()),
            ]
        );
    }

    #[test]
    fn test_download_run() {
        let download = Download {
            elf: "k".to_string(),
            start_address: "0x0".to_string(),
            noload: true,
            noexec: true,
            ..Default::default()
        };
        let reads: Vec<&[u8]> = vec![&b"\x1a"[..]; 5];
        let mut session = RpcSession::from_stream(MockStream::with_reads(&reads));
        download.run(&mut session, Echo::Silent).unwrap();
        assert_eq!(
            session.stream.written.iter().filter(|b| **b == SENTINEL).count(),
            5
        );

        // Runs out of responses part way through.
        let mut session = RpcSession::from_stream(MockStream::with_reads(&reads[..2]));
        assert!(download.run(&mut session, Echo::Silent).is_err());
    }
}
