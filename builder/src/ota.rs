// Licensed under the Apache-2.0 license

use crate::archive::{EntryRead, OutputArchive, TargetFiles};
use crate::config::InstallConfig;
use crate::install::{InstallOutcome, InstallPlanner};
use crate::script::ScriptSink;
use anyhow::{Context, Result};

/// Install-end hook for a full OTA. Adds the split bootloader and its install
/// steps when target-files carries a bootloader image.
pub fn full_ota_install_end(
    config: &InstallConfig,
    input: &mut impl TargetFiles,
    output: &mut impl OutputArchive,
    script: &mut impl ScriptSink,
) -> Result<InstallOutcome> {
    let target = input.read_entry(&config.bootloader_entry)?;
    let outcome = InstallPlanner::new(config)
        .plan_full(target)
        .with_context(|| format!("invalid {} in target_files", config.bootloader_entry))?;
    finish(outcome, output, script)
}

/// Install-end hook for an incremental OTA. Only emits work when the target
/// bootloader differs from the source one.
pub fn incremental_ota_install_end(
    config: &InstallConfig,
    target_files: &mut impl TargetFiles,
    source_files: &mut impl TargetFiles,
    output: &mut impl OutputArchive,
    script: &mut impl ScriptSink,
) -> Result<InstallOutcome> {
    let target = target_files.read_entry(&config.bootloader_entry)?;
    // Nothing to compare against without a target image.
    let source = match target {
        EntryRead::Found(_) => source_files.read_entry(&config.bootloader_entry)?,
        EntryRead::NotFound => EntryRead::NotFound,
    };
    let outcome = InstallPlanner::new(config)
        .plan_incremental(target, source)
        .with_context(|| format!("invalid {} in target target_files", config.bootloader_entry))?;
    finish(outcome, output, script)
}

fn finish(
    outcome: InstallOutcome,
    output: &mut impl OutputArchive,
    script: &mut impl ScriptSink,
) -> Result<InstallOutcome> {
    if let InstallOutcome::Emitted(plan) = &outcome {
        plan.apply(output, script)?;
    }
    Ok(outcome)
}
