//! `generate` and `routines`: the code generator from the command line.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use protosql_codegen::sql::sql_type;
use protosql_codegen::{GenerateConfig, Surface};
use protosql_descriptor::DescriptorIndex;
use protosql_runtime::RoutineName;
use std::fs;
use std::path::PathBuf;

use crate::convert::load_index;

#[derive(Args, Debug, Clone)]
pub struct GeneratorFlags {
    /// Descriptor set (binary, or JSON when the name ends in `.json`).
    #[arg(short = 'd', long)]
    pub descriptor_set: PathBuf,
    /// Proto files to generate for (default: every non-builtin file).
    pub files: Vec<String>,
    /// Plugin-style parameter string, applied before the flags below.
    #[arg(long)]
    pub parameter: Option<String>,
    #[arg(long)]
    pub descriptor_set_name: Option<String>,
    /// Only emit `new`, `to_protobuf`, `from_protobuf` and the JSON converters.
    #[arg(long)]
    pub no_methods: bool,
    #[arg(long)]
    pub include_wkt: bool,
    /// Output path template (`{path}`, `{dir}`, `{name}`, `{package}`).
    #[arg(long)]
    pub file_name: Option<String>,
    /// Routine prefix template (`{package}`, `{type}`, `{name}`).
    #[arg(long)]
    pub type_prefix: Option<String>,
}

impl GeneratorFlags {
    fn config(&self) -> Result<GenerateConfig> {
        let mut config = GenerateConfig::from_parameter(self.parameter.as_deref().unwrap_or(""))
            .context("invalid --parameter")?;
        if let Some(name) = &self.descriptor_set_name {
            config = config.with_descriptor_set_name(name.clone());
        }
        if self.no_methods {
            config = config.with_generate_methods(false);
        }
        if self.include_wkt {
            config = config.with_include_wkt(true);
        }
        if let Some(template) = &self.file_name {
            config = config.with_file_name(template.clone());
        }
        if let Some(template) = &self.type_prefix {
            config = config.with_type_prefix(template.clone());
        }
        config.validate()?;
        Ok(config)
    }

    fn files(&self, index: &DescriptorIndex) -> Vec<String> {
        if !self.files.is_empty() {
            return self.files.clone();
        }
        index
            .files()
            .iter()
            .filter(|f| !f.builtin)
            .map(|f| f.name.clone())
            .collect()
    }

    fn surface(&self) -> Result<(DescriptorIndex, Surface)> {
        let index = load_index(&self.descriptor_set)?;
        let config = self.config()?;
        let surface = Surface::build(&index, &self.files(&index), &config)?;
        Ok((index, surface))
    }
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub flags: GeneratorFlags,
    /// Output directory.
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,
}

pub fn cmd_generate(args: &GenerateArgs) -> Result<()> {
    let (index, surface) = args.flags.surface()?;
    let files = protosql_codegen::sql::render(&index, &surface)?;
    for file in files {
        let path = args.out.join(&file.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, &file.content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
    }
    Ok(())
}

#[derive(Args, Debug, Clone)]
pub struct RoutinesArgs {
    /// Show a generated surface instead of the runtime catalogue.
    #[arg(short = 'd', long)]
    pub descriptor_set: Option<PathBuf>,
    /// Proto files (with `--descriptor-set`).
    pub files: Vec<String>,
    #[arg(long)]
    pub type_prefix: Option<String>,
    /// Only names containing this substring.
    #[arg(long)]
    pub filter: Option<String>,
}

pub fn cmd_routines(args: &RoutinesArgs) -> Result<()> {
    let keep = |name: &str| args.filter.as_deref().map_or(true, |f| name.contains(f));

    let Some(descriptor_set) = &args.descriptor_set else {
        for name in RoutineName::all().map(|r| r.to_string()).filter(|n| keep(n)) {
            println!("{name}");
        }
        return Ok(());
    };

    let flags = GeneratorFlags {
        descriptor_set: descriptor_set.clone(),
        files: args.files.clone(),
        parameter: None,
        descriptor_set_name: None,
        no_methods: false,
        include_wkt: false,
        file_name: None,
        type_prefix: args.type_prefix.clone(),
    };
    let (_, surface) = flags.surface()?;
    for ty in surface.types() {
        let routines: Vec<_> = ty.routines.iter().filter(|r| keep(&r.name)).collect();
        if routines.is_empty() {
            continue;
        }
        println!("{}", ty.full_name.bold());
        for r in routines {
            let params: Vec<String> = r
                .params
                .iter()
                .map(|p| format!("{} {}", p.name, sql_type(p.ty)))
                .collect();
            println!(
                "  {}({}) -> {}",
                r.name.cyan(),
                params.join(", "),
                sql_type(r.returns)
            );
        }
    }
    Ok(())
}
