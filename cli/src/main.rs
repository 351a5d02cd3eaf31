use anyhow::Context;
use clap::{Parser, Subcommand};
use fatbridge_core::Device;
use fatbridge_filesystems::fat16::{DirEntry, DirectoryLocation, Fat16Ops, Fat16Volume, Resolved};
use fatbridge_filesystems::MountOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fatbridge")]
#[command(about = "Read-only FAT16 image browser and FUSE bridge", long_about = None)]
struct Cli {
    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the volume geometry
    Info {
        image: PathBuf,
        /// Print the volume summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// List a directory
    Ls {
        image: PathBuf,
        #[arg(default_value = "/")]
        path: String,
    },
    /// Show one entry
    Stat { image: PathBuf, path: String },
    /// Write a file's contents to stdout
    Cat {
        image: PathBuf,
        path: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Bytes to read; the rest of the file when omitted
        #[arg(long)]
        length: Option<u64>,
    },
    /// Mount the image read-only and serve it until unmounted
    Mount {
        image: PathBuf,
        mount_point: Option<String>,
        /// JSON file with mount options
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        allow_other: bool,
        #[arg(long)]
        auto_unmount: bool,
    },
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn open_volume(image: &Path) -> anyhow::Result<Fat16Volume> {
    Fat16Volume::open(image).with_context(|| format!("Failed to mount {}", image.display()))
}

fn lookup_entry(volume: &Fat16Volume, path: &str) -> anyhow::Result<Option<DirEntry>> {
    match volume.lookup(path)? {
        Resolved::Root => Ok(None),
        Resolved::Entry(located) => Ok(Some(located.entry)),
    }
}

fn print_entry(name: &str, entry: &DirEntry) {
    let kind = if entry.is_directory() { "<DIR>" } else { "" };
    let modified = entry
        .modified()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("{:<12} {:>5} {:>10} {:>6} {}", name, kind, entry.file_size, entry.first_cluster(), modified);
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { image, json } => {
            let volume = open_volume(&image)?;
            let info = volume.info()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
                return Ok(());
            }

            let g = volume.geometry();
            println!("Volume: {}", image.display());
            println!("  Label: {}", info.label.as_deref().unwrap_or("<none>"));
            println!("  Type: {} ({})", info.fs_type, g.fs_type());
            println!("  OEM: {}", info.oem_name);
            println!("  Volume ID: {:04X}-{:04X}", info.volume_id >> 16, info.volume_id & 0xFFFF);
            println!("  Bytes per sector: {}", g.bytes_per_sector);
            println!("  Sectors per cluster: {}", g.sectors_per_cluster);
            println!("  Reserved sectors: {}", g.reserved_sectors);
            println!("  FATs: {} x {} sectors", g.num_fats, g.sectors_per_fat);
            println!("  Root entries: {} at sector {}", g.root_entries, g.first_root_sector);
            println!("  First data sector: {}", g.first_data_sector);
            println!("  Clusters: {} ({} free)", info.total_clusters, info.free_clusters);
            println!("  Used: {} of {} bytes", info.used_bytes, info.total_bytes);
        }
        Commands::Ls { image, path } => {
            let volume = open_volume(&image)?;
            let location = volume.directory_at(&path)?;
            if location == DirectoryLocation::Root {
                println!("Directory of / (root table)");
            } else {
                println!("Directory of {}", path);
            }
            for (name, entry) in volume.list_directory(location)? {
                print_entry(&name, &entry);
            }
        }
        Commands::Stat { image, path } => {
            let volume = open_volume(&image)?;
            match lookup_entry(&volume, &path)? {
                None => println!("{}: volume root", path),
                Some(entry) => {
                    println!("Path: {}", path);
                    println!("  Name: {}", entry.display_name());
                    println!("  Directory: {}", entry.is_directory());
                    println!("  Read-only: {}", entry.is_read_only());
                    println!("  Attributes: {:#04x}", entry.attributes);
                    println!("  Size: {}", entry.file_size);
                    println!("  First cluster: {}", entry.first_cluster());
                    println!("  Created: {:?}", entry.created());
                    println!("  Modified: {:?}", entry.modified());
                    println!("  Accessed: {:?}", entry.accessed());
                }
            }
        }
        Commands::Cat { image, path, offset, length } => {
            let volume = open_volume(&image)?;
            let entry = lookup_entry(&volume, &path)?
                .filter(|entry| !entry.is_directory())
                .ok_or_else(|| anyhow::anyhow!("{} is a directory", path))?;

            let length = length.unwrap_or(entry.file_size as u64);
            let data = volume.read_file_range(&entry, offset, length)?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
        Commands::Mount { image, mount_point, config, allow_other, auto_unmount } => {
            let mut options = match &config {
                Some(path) => MountOptions::from_json_file(path)
                    .with_context(|| format!("Failed to load {}", path.display()))?,
                None => MountOptions::default(),
            };
            if let Some(mount_point) = mount_point {
                options.mount_point = mount_point;
            }
            options.allow_other |= allow_other;
            options.auto_unmount |= auto_unmount;

            let device = Device::from_image_path(&image)?;
            println!("Mounting {} at {} (read-only, Ctrl-C or fusermount -u to stop)", device.name, options.mount_point);
            fatbridge_filesystems::mount(&device, Box::new(Fat16Ops::new()), &options)?;
        }
    }

    Ok(())
}
