// Licensed under the Apache-2.0 license

use crate::archive::{ArchiveEntry, EntryRead, OutputArchive};
use crate::config::InstallConfig;
use crate::script::{Directive, ScriptSink};
use anyhow::Result;
use bootloader_image::FormatError;
use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementalDecision {
    NoBootloaderInTarget,
    Unchanged,
    Changed,
}

impl IncrementalDecision {
    /// A missing source never matches, so any target image counts as changed.
    pub fn decide(target: Option<&[u8]>, source: Option<&[u8]>) -> Self {
        match (target, source) {
            (None, _) => IncrementalDecision::NoBootloaderInTarget,
            (Some(target), Some(source)) if target == source => IncrementalDecision::Unchanged,
            (Some(_), _) => IncrementalDecision::Changed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoBootloaderInTarget,
    Unchanged,
}

/// Archive entries and script directives for one bootloader install, both in
/// emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallPlan {
    pub entries: Vec<ArchiveEntry>,
    pub directives: Vec<Directive>,
}

impl InstallPlan {
    /// Appends the entries to `output`, then the directives to `script`.
    /// Neither sink is touched if `script` rejects any directive.
    pub fn apply(
        &self,
        output: &mut impl OutputArchive,
        script: &mut impl ScriptSink,
    ) -> Result<()> {
        for directive in &self.directives {
            directive.check(script)?;
        }
        for entry in &self.entries {
            output.write_entry(&entry.name, &entry.data)?;
        }
        for directive in &self.directives {
            debug!("Emitting {}", directive);
            directive.emit(script)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Skipped(SkipReason),
    Emitted(InstallPlan),
}

pub struct InstallPlanner<'a> {
    config: &'a InstallConfig,
}

impl<'a> InstallPlanner<'a> {
    pub fn new(config: &'a InstallConfig) -> Self {
        Self { config }
    }

    pub fn plan_full(&self, target: EntryRead) -> Result<InstallOutcome, FormatError> {
        match target {
            EntryRead::NotFound => {
                info!("no bootloader.img in target_files; skipping install");
                Ok(InstallOutcome::Skipped(SkipReason::NoBootloaderInTarget))
            }
            EntryRead::Found(image) => {
                Ok(InstallOutcome::Emitted(self.plan_bootloader(&image)?))
            }
        }
    }

    pub fn plan_incremental(
        &self,
        target: EntryRead,
        source: EntryRead,
    ) -> Result<InstallOutcome, FormatError> {
        let target = target.into_option();
        let source = source.into_option();
        let decision = IncrementalDecision::decide(target.as_deref(), source.as_deref());

        match (decision, target) {
            (IncrementalDecision::Changed, Some(image)) => {
                info!("bootloader changed; adding it");
                Ok(InstallOutcome::Emitted(self.plan_bootloader(&image)?))
            }
            (IncrementalDecision::Unchanged, _) => {
                info!("bootloader unchanged; skipping");
                Ok(InstallOutcome::Skipped(SkipReason::Unchanged))
            }
            _ => {
                info!("no bootloader.img in target target_files; skipping install");
                Ok(InstallOutcome::Skipped(SkipReason::NoBootloaderInTarget))
            }
        }
    }

    fn plan_bootloader(&self, image: &[u8]) -> Result<InstallPlan, FormatError> {
        let parts = bootloader_image::split(image)?;
        if !parts.loader_size_matches() {
            // The whole remainder is still installed as the loader.
            warn!(
                "bootloader.img header declares a {} byte loader but {} bytes follow the IFWI",
                parts.header.loader_size(),
                parts.loader.len()
            );
        }
        debug!(
            "bootloader.img revision {}: {} byte IFWI, {} byte loader",
            parts.header.revision(),
            parts.firmware_interface.len(),
            parts.loader.len()
        );

        let config = self.config;
        Ok(InstallPlan {
            entries: vec![
                ArchiveEntry::new(&config.loader_entry, parts.loader),
                ArchiveEntry::new(&config.firmware_interface_entry, parts.firmware_interface),
            ],
            directives: vec![
                Directive::ExtractFile {
                    archive_path: config.firmware_interface_entry.clone(),
                    device_path: config.staging_path.clone(),
                },
                Directive::FlashFirmwareInterface {
                    function: config.flash_function.clone(),
                    staging_path: config.staging_path.clone(),
                },
                Directive::WriteRawImage {
                    mount_point: config.loader_partition.clone(),
                    archive_path: config.loader_entry.clone(),
                },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{ScriptError, UpdaterScript};

    fn image(ifwi: &[u8], loader: &[u8]) -> Vec<u8> {
        bootloader_image::assemble(1, ifwi, loader).unwrap()
    }

    fn plan_of(outcome: InstallOutcome) -> InstallPlan {
        match outcome {
            InstallOutcome::Emitted(plan) => plan,
            other => panic!("expected an install plan, got {:?}", other),
        }
    }

    #[test]
    fn test_decide() {
        let a: &[u8] = b"BOOTLDR!aaaa";
        let b: &[u8] = b"BOOTLDR!bbbb";
        let prefix: &[u8] = b"BOOTLDR!aaa";
        let empty: &[u8] = &[];
        assert_eq!(
            IncrementalDecision::decide(None, Some(a)),
            IncrementalDecision::NoBootloaderInTarget
        );
        assert_eq!(
            IncrementalDecision::decide(None, None),
            IncrementalDecision::NoBootloaderInTarget
        );
        assert_eq!(
            IncrementalDecision::decide(Some(a), Some(a)),
            IncrementalDecision::Unchanged
        );
        assert_eq!(
            IncrementalDecision::decide(Some(a), Some(b)),
            IncrementalDecision::Changed
        );
        assert_eq!(
            IncrementalDecision::decide(Some(a), Some(prefix)),
            IncrementalDecision::Changed
        );
        assert_eq!(
            IncrementalDecision::decide(Some(a), None),
            IncrementalDecision::Changed
        );
        assert_eq!(
            IncrementalDecision::decide(Some(empty), None),
            IncrementalDecision::Changed
        );
    }

    #[test]
    fn test_plan_full() {
        let config = InstallConfig::default();
        let planner = InstallPlanner::new(&config);
        let plan = plan_of(
            planner
                .plan_full(EntryRead::Found(image(b"AAAA", b"BBB")))
                .unwrap(),
        );

        assert_eq!(
            plan.entries,
            vec![
                ArchiveEntry::new("droidboot.img", b"BBB"),
                ArchiveEntry::new("ifwi.bin", b"AAAA"),
            ]
        );
        assert_eq!(
            plan.directives,
            vec![
                Directive::ExtractFile {
                    archive_path: "ifwi.bin".into(),
                    device_path: "/tmp/ifwi.bin".into(),
                },
                Directive::FlashFirmwareInterface {
                    function: "fugu.flash_ifwi".into(),
                    staging_path: "/tmp/ifwi.bin".into(),
                },
                Directive::WriteRawImage {
                    mount_point: "/fastboot".into(),
                    archive_path: "droidboot.img".into(),
                },
            ]
        );
    }

    #[test]
    fn test_plan_full_without_target() {
        let config = InstallConfig::default();
        assert_eq!(
            InstallPlanner::new(&config)
                .plan_full(EntryRead::NotFound)
                .unwrap(),
            InstallOutcome::Skipped(SkipReason::NoBootloaderInTarget)
        );
    }

    #[test]
    fn test_plan_full_bad_image() {
        let config = InstallConfig::default();
        let planner = InstallPlanner::new(&config);
        let mut bad = image(b"AAAA", b"BBB");
        bad[0] = b'b';
        assert_eq!(
            planner.plan_full(EntryRead::Found(bad)),
            Err(FormatError::BadMagic)
        );

        let truncated = image(b"AAAA", b"")[..22].to_vec();
        assert!(matches!(
            planner.plan_full(EntryRead::Found(truncated)),
            Err(FormatError::Truncated { .. })
        ));
    }

    #[test]
    fn test_plan_full_loader_size_mismatch_still_emitted() {
        let config = InstallConfig::default();
        let mut container = image(b"AAAA", b"BBB");
        // declare a 1 byte loader
        container[16..20].copy_from_slice(&1u32.to_le_bytes());
        let plan = plan_of(
            InstallPlanner::new(&config)
                .plan_full(EntryRead::Found(container))
                .unwrap(),
        );
        assert_eq!(plan.entries[0], ArchiveEntry::new("droidboot.img", b"BBB"));
    }

    #[test]
    fn test_plan_incremental() {
        let config = InstallConfig::default();
        let planner = InstallPlanner::new(&config);
        let target = image(b"AAAA", b"BBB");
        let source = image(b"AAAA", b"CCC");

        assert_eq!(
            planner
                .plan_incremental(
                    EntryRead::Found(target.clone()),
                    EntryRead::Found(target.clone()),
                )
                .unwrap(),
            InstallOutcome::Skipped(SkipReason::Unchanged)
        );
        assert_eq!(
            planner
                .plan_incremental(EntryRead::NotFound, EntryRead::Found(source.clone()))
                .unwrap(),
            InstallOutcome::Skipped(SkipReason::NoBootloaderInTarget)
        );

        let full = planner
            .plan_full(EntryRead::Found(target.clone()))
            .unwrap();
        assert_eq!(
            planner
                .plan_incremental(EntryRead::Found(target.clone()), EntryRead::Found(source))
                .unwrap(),
            full
        );
        assert_eq!(
            planner
                .plan_incremental(EntryRead::Found(target), EntryRead::NotFound)
                .unwrap(),
            full
        );
    }

    #[test]
    fn test_plan_incremental_unchanged_skips_validation() {
        let config = InstallConfig::default();
        let garbage = b"not a bootloader".to_vec();
        assert_eq!(
            InstallPlanner::new(&config)
                .plan_incremental(EntryRead::Found(garbage.clone()), EntryRead::Found(garbage))
                .unwrap(),
            InstallOutcome::Skipped(SkipReason::Unchanged)
        );
    }

    #[test]
    fn test_custom_recipe() {
        let config = InstallConfig::from_toml_str(
            r#"
            staging_path = "/cache/fw.bin"
            flash_function = "board.flash_fw"
            "#,
        )
        .unwrap();
        let plan = plan_of(
            InstallPlanner::new(&config)
                .plan_full(EntryRead::Found(image(b"A", b"B")))
                .unwrap(),
        );
        assert_eq!(
            plan.directives[1],
            Directive::FlashFirmwareInterface {
                function: "board.flash_fw".into(),
                staging_path: "/cache/fw.bin".into(),
            }
        );
    }

    #[test]
    fn test_apply() {
        let config = InstallConfig::default();
        let plan = plan_of(
            InstallPlanner::new(&config)
                .plan_full(EntryRead::Found(image(b"AAAA", b"BBB")))
                .unwrap(),
        );
        let mut output: Vec<ArchiveEntry> = Vec::new();
        let mut script = config.updater_script();
        plan.apply(&mut output, &mut script).unwrap();

        assert_eq!(output, plan.entries);
        assert_eq!(
            script.lines(),
            [
                "package_extract_file(\"ifwi.bin\", \"/tmp/ifwi.bin\");",
                "fugu.flash_ifwi(\"/tmp/ifwi.bin\");",
                "package_extract_file(\"droidboot.img\", \"/dev/block/by-name/fastboot\");",
            ]
        );
    }

    #[test]
    fn test_apply_unknown_partition() {
        let config = InstallConfig::default();
        let plan = plan_of(
            InstallPlanner::new(&config)
                .plan_full(EntryRead::Found(image(b"AAAA", b"BBB")))
                .unwrap(),
        );
        let mut output: Vec<ArchiveEntry> = Vec::new();
        let mut script = UpdaterScript::default();
        let err = plan.apply(&mut output, &mut script).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ScriptError>(),
            Some(&ScriptError::UnknownPartition("/fastboot".to_string()))
        );
        assert!(output.is_empty());
        assert!(script.is_empty());
    }
}
