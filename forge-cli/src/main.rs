//! `forge` — reads one or more `.forge` sources, runs the compiler
//! pipeline, and writes the emitted artifacts to disk.
//!
//! Usage: forge [--config forge.toml] <source.forge>...

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use forge_lang::{compile, Severity};
use tracing::{error, info, warn};

use config::ForgeConfig;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, sources) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(msg) => {
            eprintln!("{msg}");
            eprintln!("Usage: forge [--config <forge.toml>] <source.forge>...");
            return ExitCode::from(1);
        }
    };

    if sources.is_empty() {
        eprintln!("no source files given");
        eprintln!("Usage: forge [--config <forge.toml>] <source.forge>...");
        return ExitCode::from(1);
    }

    let config = match ForgeConfig::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            return ExitCode::from(2);
        }
    };

    let mut saw_user_error = false;
    for source_path in &sources {
        match compile_one(source_path, &config) {
            Ok(had_errors) => saw_user_error |= had_errors,
            Err(()) => return ExitCode::from(2),
        }
    }

    if saw_user_error {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

/// Compile one source file and write its artifacts. Returns `Ok(true)` if
/// the run reported an error-severity diagnostic (or a warning with
/// `warnings_as_errors` set), `Ok(false)` on a clean compile, and
/// `Err(())` on an internal failure (I/O) unrelated to the source text.
fn compile_one(source_path: &Path, config: &ForgeConfig) -> Result<bool, ()> {
    info!(path = %source_path.display(), "compiling");

    let source = std::fs::read_to_string(source_path).map_err(|err| {
        error!(path = %source_path.display(), "failed to read source: {err}");
    })?;

    let filename = source_path.display().to_string();
    let (output, diagnostics) = compile(&source, filename, env!("CARGO_PKG_VERSION"));

    for diagnostic in diagnostics.iter() {
        match diagnostic.severity {
            Severity::Error => eprintln!("{diagnostic}"),
            Severity::Warning => {
                warn!("{diagnostic}");
                eprintln!("{diagnostic}");
            }
        }
    }

    let failed = diagnostics.has_errors()
        || (config.warnings_as_errors && diagnostics.iter().any(|d| d.severity == Severity::Warning));

    if diagnostics.has_errors() {
        return Ok(true);
    }

    let stem = source_path.file_stem().and_then(|s| s.to_str()).unwrap_or("forge");
    let out_dir = config.output_dir.join(stem);
    std::fs::create_dir_all(&out_dir).map_err(|err| {
        error!(path = %out_dir.display(), "failed to create output directory: {err}");
    })?;

    write_artifact(&out_dir.join(&config.artifact_filename), &output.artifact_json)?;
    write_artifact(&out_dir.join(&config.schema_filename), &output.schema_sql)?;
    write_artifact(&out_dir.join(&config.sdk_filename), &output.sdk_text)?;

    info!(path = %out_dir.display(), "wrote artifacts");
    Ok(failed)
}

fn write_artifact(path: &Path, contents: &str) -> Result<(), ()> {
    std::fs::write(path, contents).map_err(|err| {
        error!(path = %path.display(), "failed to write artifact: {err}");
    })
}

/// Splits argv into an optional `--config <path>` and the remaining source
/// paths. Returns a human-readable error on a malformed flag.
fn parse_args(args: &[String]) -> Result<(PathBuf, Vec<PathBuf>), String> {
    let mut config_path = PathBuf::from("forge.toml");
    let mut sources = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let value = iter.next().ok_or_else(|| "--config requires a path".to_string())?;
            config_path = PathBuf::from(value);
        } else {
            sources.push(PathBuf::from(arg));
        }
    }

    Ok((config_path, sources))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sources_without_config_flag() {
        let (config_path, sources) = parse_args(&["a.forge".to_string(), "b.forge".to_string()]).unwrap();
        assert_eq!(config_path, PathBuf::from("forge.toml"));
        assert_eq!(sources, vec![PathBuf::from("a.forge"), PathBuf::from("b.forge")]);
    }

    #[test]
    fn parses_config_flag_before_sources() {
        let (config_path, sources) =
            parse_args(&["--config".to_string(), "custom.toml".to_string(), "a.forge".to_string()]).unwrap();
        assert_eq!(config_path, PathBuf::from("custom.toml"));
        assert_eq!(sources, vec![PathBuf::from("a.forge")]);
    }

    #[test]
    fn missing_config_value_is_an_error() {
        assert!(parse_args(&["--config".to_string()]).is_err());
    }
}
