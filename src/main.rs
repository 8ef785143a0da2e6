// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Command line front end for `file_map`.

use std::io::stdout;
use std::io::Write;

use anyhow::bail;
use anyhow::Context;
use argh::FromArgs;
use base::syslog;
use base::syslog::LogArgs;
use base::syslog::LogConfig;
use base::AsRawDescriptor;
use file_map::MappingRequest;
use file_map::Mode;
use log::error;
use log::info;
use serde::Serialize;

fn parse_mode(s: &str) -> Result<Mode, String> {
    s.parse::<Mode>().map_err(|e| e.to_string())
}

/// Parses a byte count written in decimal or with a `0x` prefix.
fn parse_size(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid size `{}`: {}", s, e))
}

fn parse_offset(s: &str) -> Result<usize, String> {
    let size = parse_size(s)?;
    usize::try_from(size).map_err(|_| format!("offset `{}` is too large", s))
}

fn default_log_level() -> String {
    String::from("info")
}

#[derive(FromArgs)]
#[argh(
    subcommand,
    name = "info",
    description = "Map a file and show what was mapped."
)]
struct InfoSubCommand {
    #[argh(positional)]
    file_path: String,
    #[argh(
        option,
        default = "Mode::read_shared()",
        from_str_fn(parse_mode),
        description = "mapping mode, e.g. r-shared or rw-private (default: r-shared)"
    )]
    mode: Mode,
    #[argh(
        option,
        default = "0",
        from_str_fn(parse_size),
        description = "size to grow the file to if it is empty"
    )]
    size: u64,
    #[argh(switch, description = "print the result as JSON")]
    json: bool,
}

#[derive(FromArgs)]
#[argh(
    subcommand,
    name = "cat",
    description = "Copy bytes of a mapped file to stdout."
)]
struct CatSubCommand {
    #[argh(positional)]
    file_path: String,
    #[argh(
        option,
        default = "0",
        from_str_fn(parse_offset),
        description = "first byte to copy"
    )]
    offset: usize,
    #[argh(
        option,
        from_str_fn(parse_offset),
        description = "number of bytes to copy (default: up to the end)"
    )]
    count: Option<usize>,
}

#[derive(FromArgs)]
#[argh(
    subcommand,
    name = "write",
    description = "Write a string into a mapped file and flush it."
)]
struct WriteSubCommand {
    #[argh(positional)]
    file_path: String,
    #[argh(positional)]
    data: String,
    #[argh(
        option,
        default = "0",
        from_str_fn(parse_offset),
        description = "where to put the data"
    )]
    offset: usize,
    #[argh(
        option,
        from_str_fn(parse_size),
        description = "size to grow the file to if it is empty (default: offset + data length)"
    )]
    size: Option<u64>,
    #[argh(
        option,
        default = "Mode::read_write_shared()",
        from_str_fn(parse_mode),
        description = "mapping mode (default: rw-shared)"
    )]
    mode: Mode,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Info(InfoSubCommand),
    Cat(CatSubCommand),
    Write(WriteSubCommand),
}

#[derive(FromArgs)]
#[argh(description = "Map whole files into memory.")]
struct Options {
    #[argh(
        option,
        default = "default_log_level()",
        description = "log filter, e.g. debug or file_map=trace (default: info)"
    )]
    log_level: String,
    #[argh(subcommand)]
    command: Command,
}

#[derive(Debug, Serialize)]
struct MappingInfo {
    path: String,
    mode: Mode,
    length: usize,
    descriptor: i32,
    page_size: usize,
}

fn show_info(cmd: &InfoSubCommand, out: &mut dyn Write) -> anyhow::Result<()> {
    let mapping = MappingRequest::new(&cmd.file_path)
        .mode(cmd.mode)
        .size_hint(cmd.size)
        .map()
        .with_context(|| format!("failed to map {}", cmd.file_path))?;

    let summary = MappingInfo {
        path: cmd.file_path.clone(),
        mode: mapping.mode(),
        length: mapping.len(),
        descriptor: mapping.as_raw_descriptor(),
        page_size: base::pagesize(),
    };
    if cmd.json {
        serde_json::to_writer_pretty(&mut *out, &summary)?;
        writeln!(out)?;
    } else {
        writeln!(out, "path       {}", summary.path)?;
        writeln!(out, "mode       {}", summary.mode)?;
        writeln!(out, "length     {}", summary.length)?;
        writeln!(out, "descriptor {}", summary.descriptor)?;
        writeln!(out, "page_size  {}", summary.page_size)?;
    }

    mapping
        .unmap()
        .with_context(|| format!("failed to unmap {}", cmd.file_path))?;
    Ok(())
}

fn cat(cmd: &CatSubCommand, out: &mut dyn Write) -> anyhow::Result<()> {
    let mapping = MappingRequest::new(&cmd.file_path)
        .mode(Mode::read_private())
        .map()
        .with_context(|| format!("failed to map {}", cmd.file_path))?;

    let count = match cmd.count {
        Some(count) => count,
        None => mapping.len().saturating_sub(cmd.offset),
    };
    let mut buf = vec![0u8; count];
    let read = mapping
        .read_slice(&mut buf, cmd.offset)
        .with_context(|| format!("failed to read {}", cmd.file_path))?;
    out.write_all(&buf[..read])?;
    out.flush()?;

    mapping
        .unmap()
        .with_context(|| format!("failed to unmap {}", cmd.file_path))?;
    Ok(())
}

fn write(cmd: &WriteSubCommand) -> anyhow::Result<()> {
    let data = cmd.data.as_bytes();
    let size = match cmd.size {
        Some(size) => size,
        None => (cmd.offset as u64).saturating_add(data.len() as u64),
    };
    let mut mapping = MappingRequest::new(&cmd.file_path)
        .mode(cmd.mode)
        .size_hint(size)
        .map()
        .with_context(|| format!("failed to map {}", cmd.file_path))?;

    let written = mapping
        .write_slice(data, cmd.offset)
        .with_context(|| format!("failed to write {}", cmd.file_path))?;
    if written < data.len() {
        bail!(
            "{} is {} bytes, only {} of {} bytes fit at offset {}",
            cmd.file_path,
            mapping.len(),
            written,
            data.len(),
            cmd.offset
        );
    }
    mapping
        .sync()
        .with_context(|| format!("failed to flush {}", cmd.file_path))?;
    info!("wrote {} bytes to {}", written, cmd.file_path);

    mapping
        .unmap()
        .with_context(|| format!("failed to unmap {}", cmd.file_path))?;
    Ok(())
}

fn filemap_main() -> std::result::Result<(), ()> {
    let options = argh::from_env::<Options>();

    let cfg = LogConfig {
        log_args: LogArgs {
            filter: options.log_level.clone(),
            proc_name: String::from("filemap"),
            ..Default::default()
        },
        ..Default::default()
    };
    if let Err(e) = syslog::init_with(cfg) {
        eprintln!("failed to initialize syslog: {}", e);
        return Err(());
    }

    let ret = match &options.command {
        Command::Info(i) => show_info(i, &mut stdout().lock()),
        Command::Cat(c) => cat(c, &mut stdout().lock()),
        Command::Write(w) => write(w),
    };
    ret.map_err(|e| error!("{:#}", e))
}

fn main() {
    std::process::exit(if filemap_main().is_ok() { 0 } else { 1 });
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size("0x1000"), Ok(4096));
        assert!(parse_size("4k").is_err());
        assert!(parse_size("-1").is_err());
    }

    #[test]
    fn modes() {
        assert_eq!(parse_mode("rw-private"), Ok(Mode::read_write_private()));
        assert_eq!(parse_mode("R-SHARED"), Ok(Mode::read_shared()));
        assert!(parse_mode("ro").is_err());
    }

    #[test]
    fn options() {
        let options = Options::from_args(
            &["filemap"],
            &["--log-level", "debug", "info", "a.bin", "--mode", "w-private", "--json"],
        )
        .unwrap();
        assert_eq!(options.log_level, "debug");
        match options.command {
            Command::Info(i) => {
                assert_eq!(i.file_path, "a.bin");
                assert_eq!(i.mode, Mode::write_private());
                assert_eq!(i.size, 0);
                assert!(i.json);
            }
            _ => panic!("expected info"),
        }
        assert!(Options::from_args(&["filemap"], &["info", "a.bin", "--mode", "x"]).is_err());
    }

    #[test]
    fn write_then_cat() {
        syslog::test_only_ensure_inited().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin").to_string_lossy().into_owned();

        write(&WriteSubCommand {
            file_path: path.clone(),
            data: String::from("hello"),
            offset: 3,
            size: None,
            mode: Mode::read_write_shared(),
        })
        .unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"\0\0\0hello");

        let mut out = Vec::new();
        cat(
            &CatSubCommand {
                file_path: path.clone(),
                offset: 3,
                count: Some(4),
            },
            &mut out,
        )
        .unwrap();
        assert_eq!(out, b"hell");

        // Data that doesn't fit in an existing file is reported, not truncated silently.
        let err = write(&WriteSubCommand {
            file_path: path,
            data: String::from("too long"),
            offset: 6,
            size: None,
            mode: Mode::read_write_shared(),
        })
        .unwrap_err();
        assert!(err.to_string().contains("only 2 of 8 bytes"));
    }

    #[test]
    fn info_json() {
        syslog::test_only_ensure_inited().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.bin").to_string_lossy().into_owned();

        let mut out = Vec::new();
        show_info(
            &InfoSubCommand {
                file_path: path.clone(),
                mode: Mode::read_write_private(),
                size: 8192,
                json: true,
            },
            &mut out,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["path"], path.as_str());
        assert_eq!(value["length"], 8192);
        assert_eq!(value["mode"]["access"], "Private");
        assert_eq!(fs::metadata(&path).unwrap().len(), 8192);
    }

    #[test]
    fn info_on_empty_file_needs_size() {
        syslog::test_only_ensure_inited().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin").to_string_lossy().into_owned();

        let err = show_info(
            &InfoSubCommand {
                file_path: path,
                mode: Mode::read_shared(),
                size: 0,
                json: false,
            },
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<file_map::Error>(),
            Some(file_map::Error::EmptyFileNoSize)
        ));
    }
}
