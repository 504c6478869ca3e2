//! Input/output plumbing shared by the conversion commands.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone)]
pub struct IoArgs {
    /// Input file (default: stdin).
    #[arg(short, long)]
    pub input: Option<PathBuf>,
    /// Output file (default: stdout).
    #[arg(short, long)]
    pub out: Option<PathBuf>,
    /// Wire bytes are hex text on both sides.
    #[arg(long)]
    pub hex: bool,
}

pub fn read_raw(input: Option<&Path>) -> Result<Vec<u8>> {
    match input {
        Some(path) => fs::read(path).with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

pub fn read_text(input: Option<&Path>) -> Result<String> {
    String::from_utf8(read_raw(input)?).context("input is not UTF-8")
}

/// Wire bytes from the input, hex-decoded under `--hex`.
pub fn read_wire(args: &IoArgs) -> Result<Vec<u8>> {
    let raw = read_raw(args.input.as_deref())?;
    if !args.hex {
        return Ok(raw);
    }
    let text = String::from_utf8(raw).context("hex input is not UTF-8")?;
    let compact: String = text.split_whitespace().collect();
    hex::decode(&compact).context("input is not valid hex")
}

fn write_raw(out: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
            Ok(())
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes).context("failed to write stdout")?;
            stdout.flush().context("failed to flush stdout")
        }
    }
}

pub fn write_text(out: Option<&Path>, text: &str) -> Result<()> {
    let mut text = text.to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    write_raw(out, text.as_bytes())
}

/// Wire bytes to the output, hex-encoded under `--hex`.
pub fn write_wire(args: &IoArgs, bytes: &[u8]) -> Result<()> {
    if args.hex {
        write_text(args.out.as_deref(), &hex::encode(bytes))
    } else {
        write_raw(args.out.as_deref(), bytes)
    }
}
