// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use clap::{crate_version, Parser, Subcommand};
use cratedig::cache::DecodeCache;
use cratedig::catalog::{self, Pack};
use cratedig::codec::Passthrough;
use cratedig::config;
use cratedig::export::{DeliveryResult, Exporter};
use cratedig::fetch::HttpFetcher;
use cratedig::playback::{self, Controller};
use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sample library browser."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists all samples in the given catalog listing.
    Samples {
        /// The path to the saved catalog listing.
        listing_path: String,
    },
    /// Plays a sample's preview through the audio output.
    Play {
        /// The path to the saved catalog listing.
        listing_path: String,
        /// The uuid or name of the sample to play.
        sample: String,
        /// The path to the browser config.
        #[arg(short, long)]
        config: Option<String>,
        /// The audio device to play through.
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Renders a sample's preview to a 16-bit WAV file.
    Export {
        /// The path to the saved catalog listing.
        listing_path: String,
        /// The uuid or name of the sample to export.
        sample: String,
        /// The path to the browser config.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Samples { listing_path } => {
            let samples = catalog::load_samples(&PathBuf::from(&listing_path))?;

            if samples.is_empty() {
                println!("No samples found in {}.", listing_path.as_str());
                return Ok(());
            }

            println!("Samples (count: {}):", samples.len());
            for sample in samples.iter() {
                println!("- {}", sample);
            }

            // Packs repeat across samples, so key them by name to get a
            // deduplicated, consistently ordered list.
            let mut packs: BTreeMap<&str, &Pack> = BTreeMap::new();
            for sample in samples.iter() {
                if let Some(pack) = sample.pack() {
                    packs.insert(pack.name(), pack);
                }
            }

            if !packs.is_empty() {
                println!("\nPacks (count: {}):", packs.len());
                for pack in packs.values() {
                    println!("- {}", pack.name());
                    if let Some(permalink) = pack.permalink() {
                        println!("    Permalink: {}", permalink);
                    }
                    if let Some(cover_url) = pack.cover_url() {
                        println!("    Cover: {}", cover_url);
                    }
                }
            }

            let missing = samples
                .iter()
                .filter(|sample| sample.preview_url().is_none())
                .count();
            if missing > 0 {
                println!("\nSamples without preview audio: {}", missing);
            }
        }
        Commands::Play {
            listing_path,
            sample,
            config,
            device,
        } => {
            let samples = catalog::load_samples(&PathBuf::from(&listing_path))?;
            let sample = catalog::find_sample(&samples, &sample)?;
            let config = match config {
                Some(path) => Some(config::parse_config(&PathBuf::from(path))?),
                None => None,
            };

            // An explicit --device wins over the configured one.
            let device_name = device
                .as_deref()
                .or_else(|| config.as_ref().map(|config| config.audio_device()))
                .unwrap_or("default");
            let device = playback::get_device(device_name)?;

            let fetcher = Arc::new(HttpFetcher::new()?);
            let cache = Arc::new(DecodeCache::new(fetcher, Arc::new(Passthrough)));

            println!("Playing {}.", sample.name());
            let controller = Controller::new(cache, device);
            controller.request(sample).await?;
            controller.wait_until_idle().await;
        }
        Commands::Export {
            listing_path,
            sample,
            config_path,
        } => {
            let samples = catalog::load_samples(&PathBuf::from(&listing_path))?;
            let sample = catalog::find_sample(&samples, &sample)?;
            let pack = sample.pack().ok_or("sample has no pack metadata")?;
            let config = config::parse_config(&PathBuf::from(config_path))?;

            let fetcher = Arc::new(HttpFetcher::new()?);
            let cache = Arc::new(DecodeCache::new(fetcher, Arc::new(Passthrough)));
            let exporter = Exporter::new(cache, config.export_target()?, None);

            match exporter.export(pack, sample).await? {
                DeliveryResult::Written(path) => println!("Exported {}.", path.display()),
                DeliveryResult::AlreadyDelivered(path) => {
                    println!("Already exported at {}.", path.display())
                }
            }
        }
    }

    Ok(())
}
