//! protoc plugin: `protoc --protosql_out=<dir> --protosql_opt=<params> ...`
//!
//! Reads a `CodeGeneratorRequest` on stdin and writes the response on stdout.
//! Logs go to stderr (`PROTOSQL_LOG`, default `warn`).

use anyhow::{Context, Result};
use std::io::{Read, Write};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("PROTOSQL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut request = Vec::new();
    std::io::stdin()
        .read_to_end(&mut request)
        .context("failed to read CodeGeneratorRequest from stdin")?;
    let response = protosql_codegen::plugin::process(&request)
        .context("stdin is not a CodeGeneratorRequest")?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&response)
        .context("failed to write CodeGeneratorResponse")?;
    stdout.flush()?;
    Ok(())
}
