//! protosql CLI
//!
//! Developer entrypoint for the protobuf-in-SQL toolchain:
//! - converting messages between wire bytes, ProtoJSON, NumberJSON and WireJSON
//! - generating the Opaque API SQL for a descriptor set
//! - listing runtime and generated routine names

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod convert;
mod generate;
mod io;

#[derive(Parser)]
#[command(name = "protosql")]
#[command(author, version, about = "protosql: protobuf messages inside SQL")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode wire bytes of `--type` into ProtoJSON (or NumberJSON).
    Decode {
        #[command(flatten)]
        schema: convert::SchemaArgs,
        #[command(flatten)]
        io: io::IoArgs,
        /// Print NumberJSON (unknown fields kept under `_u`) instead of ProtoJSON.
        #[arg(long)]
        number_json: bool,
        /// Print absent implicit-presence fields with their defaults.
        #[arg(long)]
        emit_defaults: bool,
    },

    /// Encode ProtoJSON (or NumberJSON) of `--type` into wire bytes.
    Encode {
        #[command(flatten)]
        schema: convert::SchemaArgs,
        #[command(flatten)]
        io: io::IoArgs,
        /// Read NumberJSON instead of ProtoJSON.
        #[arg(long)]
        number_json: bool,
        /// Reject unknown keys and enum names.
        #[arg(long)]
        strict: bool,
    },

    /// Schema-free view of wire bytes as WireJSON.
    WireJson {
        #[command(flatten)]
        io: io::IoArgs,
        /// Read WireJSON and write wire bytes.
        #[arg(long)]
        reverse: bool,
    },

    /// Convert ProtoJSON to NumberJSON (or back with `--reverse`).
    NumberJson {
        #[command(flatten)]
        schema: convert::SchemaArgs,
        /// Input file (default: stdin).
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(long)]
        reverse: bool,
        #[arg(long)]
        emit_defaults: bool,
    },

    /// Generate the Opaque API SQL for a descriptor set.
    Generate(generate::GenerateArgs),

    /// List routine names: the runtime catalogue, or a generated surface.
    Routines(generate::RoutinesArgs),
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("PROTOSQL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Decode {
            schema,
            io,
            number_json,
            emit_defaults,
        } => convert::cmd_decode(&schema, &io, number_json, emit_defaults),
        Commands::Encode {
            schema,
            io,
            number_json,
            strict,
        } => convert::cmd_encode(&schema, &io, number_json, strict),
        Commands::WireJson { io, reverse } => convert::cmd_wire_json(&io, reverse),
        Commands::NumberJson {
            schema,
            input,
            reverse,
            emit_defaults,
        } => convert::cmd_number_json(&schema, input.as_deref(), reverse, emit_defaults),
        Commands::Generate(args) => generate::cmd_generate(&args),
        Commands::Routines(args) => generate::cmd_routines(&args),
    }
}
