// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Launches an OpenOCD server in a terminal of its own, so its output stays
//! visible while downloads run against it.

use anyhow::{Context, Result, bail};
use std::env;
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use sweetada_common::platform::Platform;

/// How a new terminal is opened on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// `cmd.exe /C START`
    Windows,
    /// Terminal.app, driven by `osascript`
    MacOs,
    Xterm,
}

impl Terminal {
    pub fn for_platform(platform: Platform) -> Option<Self> {
        match platform {
            Platform::Windows => Some(Terminal::Windows),
            Platform::Unix if platform.is_darwin() => Some(Terminal::MacOs),
            Platform::Unix => Some(Terminal::Xterm),
            Platform::Unknown => None,
        }
    }
}

/// A program to run to get OpenOCD going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub program: String,
    pub args: Vec<String>,

    /// The program runs for as long as the server does
    pub detach: bool,
}

/// With `wait` the terminal stays open once OpenOCD exits, so its last
/// messages can be read.
pub fn launch_command(terminal: Terminal, cfg: &Path, wait: bool) -> Launch {
    let cfg = cfg.display().to_string();
    match terminal {
        Terminal::Windows => Launch {
            program: "cmd.exe".to_string(),
            args: vec![
                "/C".to_string(),
                "START".to_string(),
                "cmd.exe".to_string(),
                if wait { "/K" } else { "/C" }.to_string(),
                "openocd.exe".to_string(),
                "-f".to_string(),
                cfg,
            ],
            detach: false,
        },
        Terminal::MacOs => {
            let exit = if wait { "" } else { " ; exit" };
            Launch {
                program: "/usr/bin/osascript".to_string(),
                args: vec![
                    "-e".to_string(),
                    "tell application \"Terminal\"".to_string(),
                    "-e".to_string(),
                    format!("do script \"openocd -f \\\"{cfg}\\\"{exit}\""),
                    "-e".to_string(),
                    "end tell".to_string(),
                ],
                detach: false,
            }
        }
        Terminal::Xterm => {
            let mut args = Vec::new();
            if wait {
                args.push("-hold".to_string());
            }
            args.extend(["-e", "openocd", "-f"].map(str::to_string));
            args.push(cfg);
            Launch {
                program: "xterm".to_string(),
                args,
                detach: true,
            }
        }
    }
}

/// `PATH` with `<prefix>/bin` in front.
pub fn search_path(prefix: &Path, current: Option<OsString>) -> Result<OsString> {
    let mut paths = vec![prefix.join("bin")];
    if let Some(current) = current {
        paths.extend(env::split_paths(&current));
    }
    env::join_paths(paths).context("Invalid OpenOCD prefix")
}

pub fn start(prefix: &Path, cfg: &Path, wait: bool) -> Result<()> {
    let platform = Platform::detect();
    let Some(terminal) = Terminal::for_platform(platform) else {
        bail!("Platform not recognized");
    };
    let launch = launch_command(terminal, cfg, wait);
    let path = search_path(prefix, env::var_os("PATH"))?;
    log::debug!("{} {:?}", launch.program, launch.args);

    let mut command = Command::new(&launch.program);
    command.args(&launch.args).env("PATH", path);
    let error = || {
        format!(
            "System failure or OpenOCD executable not found, running {}",
            launch.program
        )
    };
    if launch.detach {
        command.spawn().with_context(error)?;
    } else {
        let status = command.status().with_context(error)?;
        if !status.success() {
            bail!("{} failed ({})", launch.program, status);
        }
    }

    println!("- Started OpenOCD with {} on {}", cfg.display(), platform);
    Ok(())
}
