//! corefile - inspect, print and (de)compress files through corefile handles

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use corefile::file_handler::{FileAccessor, OpenFlags, COMPRESS_MAX, COMPRESS_MIN, COMPRESS_NONE};
use corefile::{CoreFileConfig, CoreFileFactory};
use std::io::Write;
use std::path::PathBuf;

const CHUNK_SIZE: usize = 64 * 1024;

fn main() -> Result<()> {
    // Initialize logging; RUST_LOG=corefile=debug shows handle activity
    env_logger::init();

    let matches = Command::new("corefile")
        .version(corefile::VERSION)
        .about("Inspect, print and (de)compress files through corefile handles")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("cat")
                .about("Print a text file with byte order mark detection and line normalization")
                .arg(path_arg("file", "File to print")),
        )
        .subcommand(
            Command::new("deflate")
                .about("Compress a file with zlib")
                .arg(path_arg("input", "File to compress"))
                .arg(path_arg("output", "Destination of the compressed stream"))
                .arg(
                    Arg::new("level")
                        .long("level")
                        .short('l')
                        .value_parser(
                            value_parser!(u32)
                                .range(i64::from(COMPRESS_MIN)..=i64::from(COMPRESS_MAX)),
                        )
                        .help("Compression level (1-9), defaults to the configured level"),
                ),
        )
        .subcommand(
            Command::new("inflate")
                .about("Decompress a zlib stream")
                .arg(path_arg("input", "Compressed file"))
                .arg(path_arg("output", "Destination of the decompressed data")),
        )
        .subcommand(
            Command::new("info")
                .about("Show size and text encoding of a file")
                .arg(path_arg("file", "File to inspect")),
        )
        .get_matches();

    let config = load_config()?;
    let factory = CoreFileFactory::with_config(config);

    match matches.subcommand() {
        Some(("cat", args)) => cat(&factory, args),
        Some(("deflate", args)) => deflate(&factory, args),
        Some(("inflate", args)) => inflate(&factory, args),
        Some(("info", args)) => info(&factory, args),
        _ => unreachable!("clap enforces a subcommand"),
    }
}

fn path_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .help(help)
        .required(true)
        .value_parser(value_parser!(PathBuf))
}

fn path(args: &ArgMatches, name: &str) -> Result<PathBuf> {
    args.get_one::<PathBuf>(name)
        .cloned()
        .with_context(|| format!("missing argument: {}", name))
}

#[cfg(feature = "config")]
fn load_config() -> Result<CoreFileConfig> {
    CoreFileConfig::load_default().context("Failed to load configuration")
}

#[cfg(not(feature = "config"))]
fn load_config() -> Result<CoreFileConfig> {
    Ok(CoreFileConfig::default())
}

fn cat(factory: &CoreFileFactory, args: &ArgMatches) -> Result<()> {
    let file_path = path(args, "file")?;
    let mut file = factory
        .open(&file_path, OpenFlags::READ)
        .with_context(|| format!("Failed to open {}", file_path.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut line = [0u8; 1024];
    while let Some(len) = file.gets(&mut line) {
        match line[..len].split_last() {
            Some((b'\r', text)) => {
                out.write_all(text)?;
                out.write_all(b"\n")?;
            }
            _ => out.write_all(&line[..len])?,
        }
    }
    out.flush()?;
    Ok(())
}

fn deflate(factory: &CoreFileFactory, args: &ArgMatches) -> Result<()> {
    let input_path = path(args, "input")?;
    let output_path = path(args, "output")?;
    let level = args
        .get_one::<u32>("level")
        .copied()
        .unwrap_or(factory.config().compression_level);

    let mut input = factory
        .open(&input_path, OpenFlags::READ)
        .with_context(|| format!("Failed to open {}", input_path.display()))?;
    let mut output = factory
        .open(&output_path, OpenFlags::WRITE | OpenFlags::CREATE)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    output.compress(level).context("Failed to start compression")?;

    let total = copy(input.as_mut(), output.as_mut())?;
    output.compress(COMPRESS_NONE).context("Failed to finish compressed stream")?;

    log::info!("compressed {} bytes into {} bytes", total, output.size());
    Ok(())
}

fn inflate(factory: &CoreFileFactory, args: &ArgMatches) -> Result<()> {
    let input_path = path(args, "input")?;
    let output_path = path(args, "output")?;

    let mut input = factory
        .open(&input_path, OpenFlags::READ)
        .with_context(|| format!("Failed to open {}", input_path.display()))?;
    input
        .compress(COMPRESS_MIN)
        .context("Failed to start decompression")?;
    let mut output = factory
        .open(&output_path, OpenFlags::WRITE | OpenFlags::CREATE)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;

    let total = copy(input.as_mut(), output.as_mut())?;
    log::info!("decompressed {} bytes", total);
    Ok(())
}

fn info(factory: &CoreFileFactory, args: &ArgMatches) -> Result<()> {
    let file_path = path(args, "file")?;
    let mut file = factory
        .open(&file_path, OpenFlags::READ)
        .with_context(|| format!("Failed to open {}", file_path.display()))?;

    // the first character read settles the encoding
    let mut line = [0u8; 1024];
    let mut lines = 0u64;
    while let Some(len) = file.gets(&mut line) {
        if line[len - 1] == b'\r' {
            lines += 1;
        }
    }

    println!("path:     {}", file_path.display());
    println!("size:     {} bytes", file.size());
    println!("encoding: {}", file.text_state().encoding().name());
    println!("lines:    {}", lines);
    Ok(())
}

/// Copy `input` to `output` until a short read
fn copy(input: &mut dyn FileAccessor, output: &mut dyn FileAccessor) -> Result<u64> {
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let read = input.read(&mut chunk);
        if read > 0 {
            let written = output.write(&chunk[..read]);
            if written != read {
                bail!("short write: {} of {} bytes", written, read);
            }
            total += read as u64;
        }
        if read < chunk.len() {
            return Ok(total);
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_version_constant() {
        // Ensure version is accessible
        assert!(!corefile::VERSION.is_empty());
    }
}
