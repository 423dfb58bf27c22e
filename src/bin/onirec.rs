//! onirec CLI
//!
//! Inspect, synthesize and re-record ONI files.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use onirec::{
    CodecId, CodecRegistry, Config, NodeNotifications, NodeType, OniError, OniReader, OniWriter,
    RecordScanner, Result,
};
use tracing_subscriber::{fmt, EnvFilter};

/// onirec
#[derive(Parser, Debug)]
#[command(name = "onirec")]
#[command(about = "Record, inspect and re-record ONI sensor-stream files")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the header and the nodes of a recording
    Info {
        /// Recording to inspect
        file: PathBuf,
    },

    /// List every record with its offset
    Dump {
        /// Recording to dump (unfinalized files are accepted)
        file: PathBuf,
    },

    /// Write a synthetic depth recording
    Synth {
        /// Output file
        file: PathBuf,

        /// Number of frames
        #[arg(short, long, default_value = "30")]
        frames: u32,

        /// Frame width in pixels
        #[arg(long, default_value = "320")]
        width: u32,

        /// Frame height in pixels
        #[arg(long, default_value = "240")]
        height: u32,

        /// Frames per second
        #[arg(long, default_value = "30")]
        fps: u32,
    },

    /// Replay a recording into a new file (upgrades legacy files)
    Copy {
        /// Source recording
        input: PathBuf,

        /// Destination file
        output: PathBuf,
    },
}

/// Sink that ignores every notification
struct Discard;

impl NodeNotifications for Discard {}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,onirec=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Info { file } => info(&file),
        Commands::Dump { file } => dump(&file),
        Commands::Synth { file, frames, width, height, fps } => {
            synth(&file, frames, width, height, fps)
        }
        Commands::Copy { input, output } => copy(&input, &output),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn info(path: &Path) -> Result<()> {
    let reader = OniReader::open_path(path, Discard, Config::default(), CodecRegistry::new())?;
    let header = reader.header();

    println!("format:        {}", reader.supported_format());
    println!("version:       {}", header.version);
    println!("max timestamp: {}", header.global_max_timestamp);
    println!("max node id:   {}", header.max_node_id);
    println!();
    println!("{:>4}  {:<20} {:<10} {:<6} {:>8} {:>12} {:>12}  index", "id", "name", "type", "codec", "frames", "first ts", "last ts");
    for node in reader.nodes() {
        println!(
            "{:>4}  {:<20} {:<10} {:<6} {:>8} {:>12} {:>12}  {}",
            node.id,
            node.name,
            node.node_type.to_string(),
            node.codec.to_string(),
            node.frames,
            node.min_timestamp,
            node.max_timestamp,
            if node.indexed { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn dump(path: &Path) -> Result<()> {
    let file = std::fs::File::open(path)?;
    let scanner = RecordScanner::new(std::io::BufReader::new(file), &Config::default())?;
    println!("version {} ({:?} headers)", scanner.header().version, scanner.width());

    for scanned in scanner {
        let scanned = scanned?;
        println!("{:>10}  {}", scanned.position, scanned.record);
    }
    Ok(())
}

fn synth(path: &Path, frames: u32, width: u32, height: u32, fps: u32) -> Result<()> {
    let config = Config::default();
    let (pixels, frame_size) = frame_dimensions(width, height)?;
    if frame_size > config.max_payload_size {
        return Err(OniError::RecordTooLarge {
            size: frame_size,
            max: config.max_payload_size,
        });
    }

    let mut writer = OniWriter::create(path, config, CodecRegistry::new())?;

    writer.on_node_added("Depth1", NodeType::Depth, CodecId::UNCOMPRESSED)?;
    writer.on_node_int_prop_changed("Depth1", "xnIsGenerating", 1)?;
    writer.on_node_int_prop_changed("Depth1", "xnDeviceMaxDepth", 10_000)?;
    writer.on_node_general_prop_changed("Depth1", "xnMapOutputMode", &output_mode(width, height, fps))?;
    writer.on_node_state_ready("Depth1")?;

    let period = 1_000_000 / u64::from(fps.max(1));
    let mut frame = Vec::with_capacity(frame_size);
    for n in 1..=frames {
        frame.clear();
        for i in 0..pixels {
            let depth = ((i as u64 + u64::from(n) * 16) % 10_000) as u16;
            frame.extend_from_slice(&depth.to_le_bytes());
        }
        writer.on_node_new_data("Depth1", u64::from(n - 1) * period, n, &frame)?;
    }

    writer.close()?;
    tracing::info!("Wrote {} frames of {}x{} to {}", frames, width, height, path.display());
    Ok(())
}

/// Pixel count and 16-bit frame size in bytes
fn frame_dimensions(width: u32, height: u32) -> Result<(usize, usize)> {
    let pixels = (width as usize).checked_mul(height as usize);
    match pixels.and_then(|p| p.checked_mul(2).map(|size| (p, size))) {
        Some(dims) => Ok(dims),
        None => Err(OniError::Config(format!("frame size {}x{} overflows", width, height))),
    }
}

/// Map output mode blob: x resolution, y resolution, fps
fn output_mode(width: u32, height: u32, fps: u32) -> Vec<u8> {
    [width, height, fps]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

fn copy(input: &Path, output: &Path) -> Result<()> {
    let writer = OniWriter::create(output, Config::default(), CodecRegistry::new())?;
    let mut reader = OniReader::open_path(input, writer, Config::default(), CodecRegistry::new())?;

    let mut records = 0u64;
    while !reader.is_eof() {
        reader.read_next()?;
        records += 1;
    }

    let (_, writer) = reader.into_parts();
    writer.close()?;
    tracing::info!("Copied {} records from {} to {}", records, input.display(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_dimensions() {
        assert_eq!(frame_dimensions(320, 240).unwrap(), (76_800, 153_600));
        assert_eq!(frame_dimensions(0, 240).unwrap(), (0, 0));
        assert!(matches!(frame_dimensions(u32::MAX, u32::MAX), Err(OniError::Config(_))));
    }

    #[test]
    fn test_oversized_synth_frame_is_rejected_before_writing() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("huge.oni");

        let err = synth(&path, 1, u32::MAX, u32::MAX, 30).unwrap_err();
        assert!(matches!(err, OniError::RecordTooLarge { .. } | OniError::Config(_)));
        assert!(!path.exists());
    }
}
