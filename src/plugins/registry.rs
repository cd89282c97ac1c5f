//! Plugin registry and lifecycle manager for grafthost
//!
//! The registry is the single owner of all loaded-unit state, constructed
//! at host startup and torn down at host shutdown. Units move through
//! `Discovered → Loaded → Started → Stopped → Detached`; activation order
//! is insertion order, and shutdown stops units in that same order
//! (forward, matching the reference behavior — not reverse).
//!
//! Failure policy: one unit's load or start failure is reported through
//! the `ErrorReporter` collaborator and never aborts the remaining
//! candidates; one unit's stop failure never prevents the remaining stops.

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{info, warn};

use crate::config::ArchiveMode;
use crate::error::{HostError, Result};
use crate::host::Host;

use super::archive;
use super::loader::{self, LoadedInstance, UnitInstance};
use super::manifest::read_manifest;
use super::source::{CodeSource, DirSource};
use super::types::{Manifest, PluginCandidate, SourceKind, UnitState};

/// Error-reporting collaborator consumed by the registry. The default
/// implementation logs; tests substitute a collecting double.
pub trait ErrorReporter {
    fn report(&self, unit: &str, error: &HostError);
}

/// Reports unit failures through `tracing`.
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, unit: &str, error: &HostError) {
        warn!(unit = %unit, error = %error, "Plugin unit failed");
    }
}

/// Outcome of one discovery-and-activation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationSummary {
    /// Candidates fully activated.
    pub started: usize,
    /// Candidates that failed to load or start.
    pub failed: usize,
}

/// One unit resident in the registry.
struct ActiveUnit {
    name: String,
    manifest: Option<Manifest>,
    /// `None` for function-style symbols, which ran once at load and have
    /// no stop phase.
    instance: Option<UnitInstance>,
    /// Code root the unit was loaded from.
    source_root: String,
    state: UnitState,
}

/// Ordered collection of active units plus the lifecycle driver.
pub struct PluginRegistry {
    host: Arc<Host>,
    archive_mode: ArchiveMode,
    staging: PathBuf,
    reporter: Box<dyn ErrorReporter>,
    active: Vec<ActiveUnit>,
    // Keeps a per-run staging tempdir alive for the registry's lifetime.
    _staging_guard: Option<TempDir>,
}

impl PluginRegistry {
    /// Registry with extract-mode archives staged in a fresh temp dir.
    pub fn new(host: Arc<Host>) -> Result<Self> {
        Self::with_options(host, ArchiveMode::Extract, None)
    }

    /// Registry with an explicit archive mode and optional staging root.
    pub fn with_options(
        host: Arc<Host>,
        archive_mode: ArchiveMode,
        staging_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let (staging, guard) = match staging_dir {
            Some(dir) => {
                std::fs::create_dir_all(&dir)?;
                (dir, None)
            }
            None => {
                let tmp = TempDir::new()?;
                (tmp.path().to_path_buf(), Some(tmp))
            }
        };
        Ok(Self {
            host,
            archive_mode,
            staging,
            reporter: Box::new(TracingReporter),
            active: Vec::new(),
            _staging_guard: guard,
        })
    }

    /// Replace the error reporter (tests use a collecting double).
    pub fn with_reporter(mut self, reporter: Box<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// The host capability surface shared with units.
    pub fn host(&self) -> &Arc<Host> {
        &self.host
    }

    /// Activate every candidate, isolating failures per unit.
    pub fn activate_all<I>(&mut self, candidates: I) -> ActivationSummary
    where
        I: IntoIterator<Item = PluginCandidate>,
    {
        let mut summary = ActivationSummary {
            started: 0,
            failed: 0,
        };
        for candidate in candidates {
            match self.activate(&candidate) {
                Ok(()) => summary.started += 1,
                Err(e) => {
                    self.reporter.report(&candidate.unit_name(), &e);
                    summary.failed += 1;
                }
            }
        }
        info!(
            started = summary.started,
            failed = summary.failed,
            "Activation pass complete"
        );
        summary
    }

    /// Load and start one candidate.
    ///
    /// Loose files carry no manifest; every symbol section in the file is
    /// loaded as its own unit, in file order. Archives are read through
    /// their descriptor and either extracted to staging or mounted in
    /// place, per the configured archive mode.
    pub fn activate(&mut self, candidate: &PluginCandidate) -> Result<()> {
        match candidate.kind {
            SourceKind::LooseFile => {
                let text = std::fs::read_to_string(&candidate.path)?;
                let root = candidate.path.display().to_string();
                let loaded = loader::load_source_text(&text, &self.host)?;
                for (symbol, instance) in loaded {
                    self.admit(symbol, None, instance, root.clone())?;
                }
                Ok(())
            }
            SourceKind::Archive => {
                let descriptor = archive::read_descriptor(&candidate.path)?;
                let manifest = read_manifest(&descriptor)?;
                let (loaded, root) = match self.archive_mode {
                    ArchiveMode::Extract => {
                        let root = archive::install(&candidate.path, &self.staging)?;
                        let source = DirSource::new(root);
                        let loaded = loader::load(&manifest.entry_point, &source, &self.host)?;
                        (loaded, source.describe())
                    }
                    ArchiveMode::Mount => {
                        let source = archive::mount(&candidate.path);
                        let loaded = loader::load(&manifest.entry_point, &source, &self.host)?;
                        (loaded, source.describe())
                    }
                };
                self.admit(manifest.name.clone(), Some(manifest), loaded, root)
            }
        }
    }

    /// Drive a freshly loaded unit into the registry: `set_host` then
    /// `start` for class-style instances, straight to rest for run-once
    /// symbols. A start failure detaches the instance and is propagated;
    /// the unit is not admitted.
    fn admit(
        &mut self,
        name: String,
        manifest: Option<Manifest>,
        loaded: LoadedInstance,
        source_root: String,
    ) -> Result<()> {
        match loaded {
            LoadedInstance::RanOnce => {
                info!(unit = %name, root = %source_root, "Unit ran once at load");
                self.active.push(ActiveUnit {
                    name,
                    manifest,
                    instance: None,
                    source_root,
                    state: UnitState::Started,
                });
                Ok(())
            }
            LoadedInstance::Instance(mut instance) => {
                instance.set_host(Some(self.host.clone()));
                if let Err(e) = instance.start() {
                    instance.set_host(None);
                    return Err(e);
                }
                info!(unit = %name, root = %source_root, "Unit started");
                self.active.push(ActiveUnit {
                    name,
                    manifest,
                    instance: Some(instance),
                    source_root,
                    state: UnitState::Started,
                });
                Ok(())
            }
        }
    }

    /// Stop all units in activation order, then detach them.
    ///
    /// Each unit's `stop` failure is reported and does not prevent the
    /// remaining stops. After shutdown every unit has released its host
    /// back-reference.
    pub fn shutdown(&mut self) {
        for unit in &mut self.active {
            if let Some(instance) = unit.instance.as_mut() {
                if unit.state == UnitState::Started {
                    if let Err(e) = instance.stop() {
                        self.reporter.report(&unit.name, &e);
                    }
                    unit.state = UnitState::Stopped;
                }
                instance.set_host(None);
            }
            unit.state = UnitState::Detached;
            info!(unit = %unit.name, "Unit detached");
        }
    }

    /// Names of resident units, in activation order.
    pub fn unit_names(&self) -> Vec<&str> {
        self.active.iter().map(|u| u.name.as_str()).collect()
    }

    /// Number of resident units.
    pub fn unit_count(&self) -> usize {
        self.active.len()
    }

    /// Manifest of a resident unit, when it shipped one.
    pub fn manifest_of(&self, name: &str) -> Option<&Manifest> {
        self.active
            .iter()
            .find(|u| u.name == name)
            .and_then(|u| u.manifest.as_ref())
    }

    /// Code root a resident unit was loaded from.
    pub fn source_root_of(&self, name: &str) -> Option<&str> {
        self.active
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.source_root.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::types::DESCRIPTOR_NAME;
    use std::io::Write;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn capture_host() -> (Arc<Host>, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = lines.clone();
        let host = Arc::new(Host::with_sink(Arc::new(move |line: &str| {
            captured.lock().unwrap().push(line.to_string());
        })));
        (host, lines)
    }

    /// Collects reported unit failures for assertions.
    struct CollectingReporter {
        failures: Arc<Mutex<Vec<String>>>,
    }

    impl ErrorReporter for CollectingReporter {
        fn report(&self, unit: &str, error: &HostError) {
            self.failures
                .lock()
                .unwrap()
                .push(format!("{unit}: {error}"));
        }
    }

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    /// Standard archive unit: `name`, greeting on start, farewell on stop.
    fn greeting_archive(dir: &Path, name: &str) -> PluginCandidate {
        let path = dir.join(format!("{name}.pkg"));
        let descriptor = format!(
            "[general]\nname={name}\ndescription=greeter unit\ncode={name}.{}\n",
            capitalized(name)
        );
        let module = format!(
            "[{}]\nkind = class\non_start = sayHello {name}\n",
            capitalized(name)
        );
        let module_file = format!("{name}.src");
        write_archive(
            &path,
            &[
                (DESCRIPTOR_NAME, descriptor.as_str()),
                (module_file.as_str(), module.as_str()),
            ],
        );
        PluginCandidate::new(SourceKind::Archive, path)
    }

    fn capitalized(name: &str) -> String {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    fn loose_unit(dir: &Path, file: &str, content: &str) -> PluginCandidate {
        let path = dir.join(file);
        std::fs::write(&path, content).unwrap();
        PluginCandidate::new(SourceKind::LooseFile, path)
    }

    #[test]
    fn test_two_archives_greet_in_activation_order() {
        let tmp = TempDir::new().unwrap();
        let (host, lines) = capture_host();
        let mut registry = PluginRegistry::new(host).unwrap();

        let candidates = vec![
            greeting_archive(tmp.path(), "plugin1"),
            greeting_archive(tmp.path(), "plugin2"),
        ];
        let summary = registry.activate_all(candidates);

        assert_eq!(summary, ActivationSummary { started: 2, failed: 0 });
        assert_eq!(
            lines.lock().unwrap().as_slice(),
            ["hello from plugin1.", "hello from plugin2."]
        );
        assert_eq!(registry.unit_names(), ["plugin1", "plugin2"]);
        assert!(registry.manifest_of("plugin1").is_some());
    }

    #[test]
    fn test_shutdown_stops_in_activation_order() {
        let tmp = TempDir::new().unwrap();
        let (host, lines) = capture_host();
        let mut registry = PluginRegistry::new(host).unwrap();

        for name in ["a", "b", "c"] {
            let content = format!("[Unit]\nkind = class\non_stop = sayHello {name}\n");
            let candidate = loose_unit(tmp.path(), &format!("{name}.src"), &content);
            registry.activate(&candidate).unwrap();
        }

        registry.shutdown();
        assert_eq!(
            lines.lock().unwrap().as_slice(),
            ["hello from a.", "hello from b.", "hello from c."]
        );
    }

    #[test]
    fn test_start_failure_does_not_block_later_units() {
        let tmp = TempDir::new().unwrap();
        let (host, lines) = capture_host();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new(host)
            .unwrap()
            .with_reporter(Box::new(CollectingReporter {
                failures: failures.clone(),
            }));

        let bad = loose_unit(
            tmp.path(),
            "bad.src",
            "[Bad]\nkind = class\non_start = noSuchOp bad\n",
        );
        let good = loose_unit(
            tmp.path(),
            "good.src",
            "[Good]\nkind = class\non_start = sayHello good\n",
        );

        let summary = registry.activate_all(vec![bad, good]);
        assert_eq!(summary, ActivationSummary { started: 1, failed: 1 });
        assert_eq!(lines.lock().unwrap().as_slice(), ["hello from good."]);
        assert_eq!(registry.unit_names(), ["Good"]);

        let reported = failures.lock().unwrap();
        assert_eq!(reported.len(), 1);
        assert!(reported[0].contains("bad"));
        assert!(reported[0].contains("noSuchOp"));
    }

    #[test]
    fn test_grafted_goodbye_available_to_later_stops() {
        let tmp = TempDir::new().unwrap();
        let (host, lines) = capture_host();

        // Before any unit grafts it, sayGoodbye is unknown.
        assert!(matches!(
            host.invoke("sayGoodbye", "nobody"),
            Err(HostError::CapabilityNotFound(_))
        ));

        let mut registry = PluginRegistry::new(host.clone()).unwrap();
        let grafting = loose_unit(
            tmp.path(),
            "plugin2.src",
            "[Plugin2]\nkind = class\nprovides = sayGoodbye => goodbye from {from}.\non_stop = sayGoodbye plugin2\n",
        );
        let caller = loose_unit(
            tmp.path(),
            "plugin3.src",
            "[Plugin3]\nkind = class\non_stop = sayGoodbye plugin3\n",
        );

        let summary = registry.activate_all(vec![grafting, caller]);
        assert_eq!(summary.failed, 0);
        assert!(host.has_operation("sayGoodbye"));

        registry.shutdown();
        assert_eq!(
            lines.lock().unwrap().as_slice(),
            ["goodbye from plugin2.", "goodbye from plugin3."]
        );
    }

    #[test]
    fn test_malformed_manifest_skipped_sibling_still_loads() {
        let tmp = TempDir::new().unwrap();
        let (host, lines) = capture_host();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new(host)
            .unwrap()
            .with_reporter(Box::new(CollectingReporter {
                failures: failures.clone(),
            }));

        // Descriptor missing the `code` key.
        let broken_path = tmp.path().join("broken.pkg");
        write_archive(
            &broken_path,
            &[(DESCRIPTOR_NAME, "[general]\nname=broken\ndescription=d\n")],
        );
        let broken = PluginCandidate::new(SourceKind::Archive, broken_path);
        let fine = greeting_archive(tmp.path(), "plugin1");

        let summary = registry.activate_all(vec![broken, fine]);
        assert_eq!(summary, ActivationSummary { started: 1, failed: 1 });
        assert_eq!(lines.lock().unwrap().as_slice(), ["hello from plugin1."]);
        assert!(failures.lock().unwrap()[0].contains("'code'"));
    }

    #[test]
    fn test_mount_mode_loads_without_staging_writes() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join("staging");
        let (host, lines) = capture_host();
        let mut registry = PluginRegistry::with_options(
            host,
            ArchiveMode::Mount,
            Some(staging.clone()),
        )
        .unwrap();

        let candidate = greeting_archive(tmp.path(), "plugin1");
        registry.activate(&candidate).unwrap();

        assert_eq!(lines.lock().unwrap().as_slice(), ["hello from plugin1."]);
        assert!(registry
            .source_root_of("plugin1")
            .unwrap()
            .ends_with("(mounted)"));
        // Mount mode never extracts.
        assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
    }

    #[test]
    fn test_loose_file_loads_all_symbols_in_file_order() {
        let tmp = TempDir::new().unwrap();
        let (host, lines) = capture_host();
        let mut registry = PluginRegistry::new(host).unwrap();

        let candidate = loose_unit(
            tmp.path(),
            "mixed.src",
            "[announce]\nkind = function\ncalls = sayHello announcer\n\n[Worker]\nkind = class\non_start = sayHello worker\n",
        );
        registry.activate(&candidate).unwrap();

        assert_eq!(
            lines.lock().unwrap().as_slice(),
            ["hello from announcer.", "hello from worker."]
        );
        assert_eq!(registry.unit_names(), ["announce", "Worker"]);
    }

    #[test]
    fn test_stop_failure_isolated_per_unit() {
        let tmp = TempDir::new().unwrap();
        let (host, lines) = capture_host();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new(host)
            .unwrap()
            .with_reporter(Box::new(CollectingReporter {
                failures: failures.clone(),
            }));

        let flaky = loose_unit(
            tmp.path(),
            "flaky.src",
            "[Flaky]\nkind = class\non_stop = noSuchOp flaky\n",
        );
        let steady = loose_unit(
            tmp.path(),
            "steady.src",
            "[Steady]\nkind = class\non_stop = sayHello steady\n",
        );
        registry.activate_all(vec![flaky, steady]);

        registry.shutdown();
        // The flaky stop was reported; the steady stop still ran.
        assert_eq!(failures.lock().unwrap().len(), 1);
        assert_eq!(lines.lock().unwrap().as_slice(), ["hello from steady."]);
    }
}
