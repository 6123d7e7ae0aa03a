// Licensed under the Apache-2.0 license

use anyhow::Result;
use bootloader_ota::image::{
    bootloader_image_create, bootloader_image_info, bootloader_image_unpack,
};
use bootloader_ota::InstallConfig;
use clap::{Parser, Subcommand};
use clap_num::maybe_hex;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::PathBuf;

mod package;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML file overriding the default install recipe
    #[arg(long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add the bootloader to a full OTA package
    Full {
        /// target-files zip holding RADIO/bootloader.img
        #[arg(long, value_name = "ZIP")]
        target_files: PathBuf,

        /// OTA package to create
        #[arg(long, value_name = "ZIP")]
        output: PathBuf,

        /// Where to write the install script; stdout when omitted
        #[arg(long, value_name = "FILE")]
        script: Option<PathBuf>,
    },
    /// Add the bootloader to an incremental OTA package if it changed
    Incremental {
        #[arg(long, value_name = "ZIP")]
        target_files: PathBuf,

        /// source-files zip of the build being updated from
        #[arg(long, value_name = "ZIP")]
        source_files: PathBuf,

        #[arg(long, value_name = "ZIP")]
        output: PathBuf,

        #[arg(long, value_name = "FILE")]
        script: Option<PathBuf>,
    },
    /// Split a bootloader image into ifwi.bin and droidboot.img
    Unpack {
        #[arg(long, value_name = "FILE")]
        image: PathBuf,

        #[arg(long, value_name = "DIR")]
        out_dir: PathBuf,
    },
    /// Combine an IFWI blob and a droidboot blob into a bootloader image
    Pack {
        #[arg(long, value_name = "FILE")]
        ifwi: PathBuf,

        #[arg(long, value_name = "FILE")]
        droidboot: PathBuf,

        #[arg(long, value_name = "FILE")]
        output: PathBuf,

        /// Header revision, decimal or 0x-prefixed hex
        #[arg(long, value_parser = maybe_hex::<u16>, default_value_t = 1)]
        revision: u16,
    },
    /// Print the header of a bootloader image
    Info {
        #[arg(long, value_name = "FILE")]
        image: PathBuf,
    },
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => InstallConfig::from_file(path)?,
        None => InstallConfig::default(),
    };

    match &cli.command {
        Commands::Full {
            target_files,
            output,
            script,
        } => package::full(&config, target_files, output, script.as_deref()),
        Commands::Incremental {
            target_files,
            source_files,
            output,
            script,
        } => package::incremental(&config, target_files, source_files, output, script.as_deref()),
        Commands::Unpack { image, out_dir } => {
            let (ifwi, droidboot) = bootloader_image_unpack(image, out_dir)?;
            println!("Wrote {} and {}", ifwi.display(), droidboot.display());
            Ok(())
        }
        Commands::Pack {
            ifwi,
            droidboot,
            output,
            revision,
        } => {
            bootloader_image_create(ifwi, droidboot, *revision, output)?;
            println!("Wrote bootloader image {}", output.display());
            Ok(())
        }
        Commands::Info { image } => {
            println!("{}", bootloader_image_info(image)?);
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = SimpleLogger::new().with_level(level).init();

    run(&cli).unwrap_or_else(|e| {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_pack_hex_revision() {
        let cli = Cli::try_parse_from([
            "bootloader-ota",
            "pack",
            "--ifwi",
            "ifwi.bin",
            "--droidboot",
            "droidboot.img",
            "--output",
            "bootloader.img",
            "--revision",
            "0x102",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Pack { revision: 0x102, .. }));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "bootloader-ota",
            "full",
            "--target-files",
            "target.zip",
            "--output",
            "ota.zip",
            "--config",
            "fugu.toml",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("fugu.toml")));
        assert!(matches!(cli.command, Commands::Full { script: None, .. }));
    }
}
