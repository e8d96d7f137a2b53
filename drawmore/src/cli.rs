//! Command line parsing and the commands themselves.

use drawmore_core::io::{self, raster::PngCodec, Format, Target, Version};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const USAGE: &str = "usage:
    drawmore inspect <file>...
    drawmore convert <in> <out> [--v3|--v4|--compressed|--picture]";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Inspect(Vec<PathBuf>),
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Chosen from the output name when not given.
        target: Option<Target>,
    },
}
impl Command {
    /// Parse from the arguments, not including the program name.
    /// Paths are `OsStrings`, let the system handle character encoding restrictions.
    pub fn parse(args: impl IntoIterator<Item = OsString>) -> anyhow::Result<Self> {
        let mut args = args.into_iter();
        let command = args
            .next()
            .ok_or_else(|| anyhow::anyhow!("missing command\n{USAGE}"))?;
        match command.to_str() {
            Some("inspect") => {
                let paths: Vec<PathBuf> = args.map(Into::into).collect();
                if paths.is_empty() {
                    anyhow::bail!("nothing to inspect\n{USAGE}");
                }
                Ok(Self::Inspect(paths))
            }
            Some("convert") => {
                let mut paths = Vec::with_capacity(2);
                let mut target = None;
                for arg in args {
                    let flag = match arg.to_str() {
                        Some("--v3") => Some(Target::Container(Version::V3)),
                        Some("--v4") => Some(Target::Container(Version::V4)),
                        // Version filled in from settings later.
                        Some("--compressed") => Some(Target::Compressed(Version::CURRENT)),
                        Some("--picture") => Some(Target::Picture),
                        Some(other) if other.starts_with("--") => {
                            anyhow::bail!("unknown flag {other}\n{USAGE}")
                        }
                        _ => None,
                    };
                    match flag {
                        None => paths.push(PathBuf::from(arg)),
                        Some(flag) => {
                            if target.replace(flag).is_some() {
                                anyhow::bail!("more than one output format given\n{USAGE}");
                            }
                        }
                    }
                }
                let [input, output]: [PathBuf; 2] = paths.try_into().map_err(|_| {
                    anyhow::anyhow!("convert takes one input and one output\n{USAGE}")
                })?;
                Ok(Self::Convert {
                    input,
                    output,
                    target,
                })
            }
            _ => anyhow::bail!("unknown command {command:?}\n{USAGE}"),
        }
    }
}

/// The format to write when none was asked for, or to complete a partial request.
#[must_use]
pub fn resolve_target(target: Option<Target>, output: &Path, version: Version) -> Target {
    match target {
        Some(Target::Compressed(_)) => Target::Compressed(version),
        Some(target) => target,
        None => {
            let is_png = output
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            if is_png {
                Target::Picture
            } else {
                Target::Container(version)
            }
        }
    }
}

/// Describe each file. Failures are logged and skipped.
/// # Errors
/// If every file failed.
pub async fn inspect(paths: &[PathBuf]) -> anyhow::Result<()> {
    let decoder = PngCodec::default();
    let mut had_success = false;
    for path in paths {
        let summary: anyhow::Result<String> = async {
            let bytes = std::fs::read(path)?;
            let format = Format::sniff(&bytes)?;
            let document = io::decode(&bytes, &decoder).await?;
            let version = match format {
                Format::Container => format!(" v{}", bytes[0]),
                Format::Compressed => " (compressed)".to_owned(),
                Format::Picture => String::new(),
            };
            let snapshots: Vec<String> = document
                .snapshots
                .iter()
                .map(|snapshot| match snapshot.state.texture_size() {
                    Some((width, height)) => format!("{} ({width}x{height})", snapshot.index),
                    None => snapshot.index.to_string(),
                })
                .collect();
            Ok::<_, anyhow::Error>(format!(
                "{format:?}{version}, {} commands ({} live), snapshots at [{}]",
                document.draw_array.len(),
                document.draw_end_index,
                snapshots.join(", ")
            ))
        }
        .await;

        match summary {
            Ok(summary) => {
                had_success = true;
                println!("{}: {summary}", path.display());
            }
            Err(e) => log::error!("failed to inspect {path:?}: {e:#}"),
        }
    }
    if !had_success {
        anyhow::bail!("no file could be read");
    }
    Ok(())
}

/// Read `input` in whatever format it is and write it out as `target`.
/// # Errors
/// If reading, decoding, encoding, or writing fails.
pub async fn convert(
    input: &Path,
    output: &Path,
    target: Target,
    settings: &io::EncodeSettings,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(input)?;
    let document = io::decode(&bytes, &PngCodec::default()).await?;
    log::debug!(
        "read {input:?}: {} commands, {} snapshots",
        document.draw_array.len(),
        document.snapshots.len()
    );
    let encoded = io::encode(&document, target, settings)?;
    std::fs::write(output, &encoded)?;
    log::info!(
        "wrote {output:?} as {target:?}, {} -> {} bytes",
        bytes.len(),
        encoded.len()
    );
    Ok(())
}
