// Licensed under the Apache-2.0 license

use anyhow::{Context, Result};
use bootloader_ota::{
    full_ota_install_end, incremental_ota_install_end, InstallConfig, InstallOutcome, OtaPackage,
    UpdaterScript,
};
use log::info;
use std::fs::{self, File};
use std::path::Path;
use zip::ZipArchive;

fn open_target_files(path: &Path) -> Result<ZipArchive<File>> {
    let file =
        File::open(path).with_context(|| format!("Cannot open file '{}'", path.display()))?;
    ZipArchive::new(file).with_context(|| format!("'{}' is not a zip archive", path.display()))
}

fn write_script(script: &UpdaterScript, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => fs::write(path, script.text())
            .with_context(|| format!("Unable to write file {}", path.display())),
        None => {
            print!("{}", script.text());
            Ok(())
        }
    }
}

/// Creates the OTA package at `output`, lets `fill` populate it, and writes
/// the script. Nothing is left behind at `output` if any step fails.
fn build_package<F>(
    output: &Path,
    script_path: Option<&Path>,
    config: &InstallConfig,
    fill: F,
) -> Result<()>
where
    F: FnOnce(&mut OtaPackage<File>, &mut UpdaterScript) -> Result<InstallOutcome>,
{
    let file =
        File::create(output).with_context(|| format!("Unable to create {}", output.display()))?;
    let mut package = OtaPackage::new(file);
    let mut script = config.updater_script();

    let written = fill(&mut package, &mut script).and_then(|outcome| {
        package.finish()?;
        write_script(&script, script_path)?;
        Ok(outcome)
    });
    let outcome = match written {
        Ok(outcome) => outcome,
        Err(e) => {
            let _ = fs::remove_file(output);
            return Err(e);
        }
    };

    if let InstallOutcome::Emitted(plan) = outcome {
        info!(
            "Wrote {} entries and {} install steps to {}",
            plan.entries.len(),
            plan.directives.len(),
            output.display()
        );
    }
    Ok(())
}

pub(crate) fn full(
    config: &InstallConfig,
    target_files: &Path,
    output: &Path,
    script_path: Option<&Path>,
) -> Result<()> {
    let mut input = open_target_files(target_files)?;
    build_package(output, script_path, config, |package, script| {
        full_ota_install_end(config, &mut input, package, script)
    })
}

pub(crate) fn incremental(
    config: &InstallConfig,
    target_files: &Path,
    source_files: &Path,
    output: &Path,
    script_path: Option<&Path>,
) -> Result<()> {
    let mut target = open_target_files(target_files)?;
    let mut source = open_target_files(source_files)?;
    build_package(output, script_path, config, |package, script| {
        incremental_ota_install_end(config, &mut target, &mut source, package, script)
    })
}
