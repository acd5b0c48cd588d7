//! Build sessions.
//!
//! A [`Session`] carries everything that outlives a single build: the tracked
//! build directory, the anonymous-name counter and the libraries it loaded.
//! One request runs start to finish before the next begins; callers sharing a
//! session across threads must serialize access themselves.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::builder::artifact::{artifact_path, load_library, NativeLibrary};
use crate::builder::build_dir::{write_package, BuildCache, ReleaseGuard};
use crate::builder::cargo::{invoke, CargoInvocation, CargoRunner, CompilerRunner};
use crate::builder::diagnostics::DiagnosticProcessor;
use crate::builder::target::{
    resolve_plan, CompanionProbe, HostDescriptor, SystemProbe, ToolchainPlan,
};
use crate::core::errors::{ArtifactError, BuildError, CompileError, ConfigError};
use crate::core::manifest::{CargoConfig, Manifest};
use crate::core::naming::{name_for_file, LibraryNamer};
use crate::core::request::{BuildRequest, SourcePayload};
use crate::ops::collaborators::{BindingGenerator, RegistrationIntrospector};
use crate::util::config::Config;
use crate::util::fs::read_to_string;
use crate::util::shell::{format_duration, Shell, Status};

/// Result of running the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub success: bool,
    /// The library cargo produced. `Some` iff `success`.
    ///
    /// For uncached builds the directory is gone by the time the caller sees
    /// this path.
    pub artifact: Option<PathBuf>,
    /// Rendered compiler errors in emission order. Empty on success.
    pub errors: Vec<String>,
    /// Rendered compiler warnings, possibly empty.
    pub warnings: Vec<String>,
    pub library_name: String,
    pub build_dir: PathBuf,
}

impl BuildOutcome {
    /// The artifact path, or the collected errors.
    pub fn into_result(self) -> Result<PathBuf, CompileError> {
        match self.artifact {
            Some(path) if self.success => Ok(path),
            _ => Err(CompileError {
                messages: self.errors,
            }),
        }
    }
}

/// A library built and loaded by a [`Session`].
#[derive(Clone)]
pub struct CompiledLibrary {
    pub name: String,
    pub library: Arc<NativeLibrary>,
    pub warnings: Vec<String>,
    /// Wrapper file written by the session's [`BindingGenerator`].
    pub bindings: Option<PathBuf>,
}

impl CompiledLibrary {
    pub fn path(&self) -> &Path {
        self.library.path()
    }
}

impl fmt::Debug for CompiledLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledLibrary")
            .field("name", &self.name)
            .field("path", &self.path())
            .field("warnings", &self.warnings.len())
            .field("bindings", &self.bindings)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Build,
    Load,
}

/// Long-lived build state for one host process.
pub struct Session {
    config: Config,
    shell: Arc<Shell>,
    cache: BuildCache,
    namer: LibraryNamer,
    host: HostDescriptor,
    probe: Box<dyn CompanionProbe>,
    runner: Arc<dyn CompilerRunner>,
    /// Loaded libraries by artifact path.
    loaded: HashMap<PathBuf, Arc<NativeLibrary>>,
    introspector: Option<Box<dyn RegistrationIntrospector>>,
    bindings: Option<Box<dyn BindingGenerator>>,
}

impl Session {
    /// A session for the current host, running the real cargo.
    pub fn new(config: Config, shell: Arc<Shell>) -> Result<Self, ConfigError> {
        let host = HostDescriptor::current(config.runtime()?);
        let cache = match &config.build.dir {
            Some(dir) => BuildCache::in_dir(dir),
            None => BuildCache::new(),
        };

        Ok(Session {
            config,
            shell,
            cache,
            namer: LibraryNamer::new(),
            host,
            probe: Box::new(SystemProbe),
            runner: Arc::new(CargoRunner),
            loaded: HashMap::new(),
            introspector: None,
            bindings: None,
        })
    }

    pub fn with_host(mut self, host: HostDescriptor) -> Self {
        self.host = host;
        self
    }

    pub fn with_probe(mut self, probe: impl CompanionProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CompilerRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_cache(mut self, cache: BuildCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_introspector(mut self, hook: impl RegistrationIntrospector + 'static) -> Self {
        self.introspector = Some(Box::new(hook));
        self
    }

    pub fn with_binding_generator(mut self, hook: impl BindingGenerator + 'static) -> Self {
        self.bindings = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    pub fn cache(&self) -> &BuildCache {
        &self.cache
    }

    /// Number of libraries currently held loaded.
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// Resolve the toolchain plan without building.
    pub fn plan(&self, toolchain: Option<&str>) -> Result<ToolchainPlan, ConfigError> {
        let channel = toolchain.or(self.config.build.toolchain.as_deref());
        resolve_plan(&self.host, self.probe.as_ref(), channel)
    }

    /// The `Cargo.toml` a request would be built with.
    ///
    /// Inline sources are previewed under the next anonymous name without
    /// consuming it.
    pub fn preview_manifest(&self, request: &BuildRequest) -> anyhow::Result<String> {
        let name = match request.source() {
            SourcePayload::Code(_) => self.namer.clone().next_anonymous(),
            SourcePayload::File(path) => name_for_file(path),
        };
        Manifest::synthesize(request, &name, &self.config.base_dependencies()).to_toml()
    }

    /// Run the compiler for `request` without loading the result.
    pub fn build(&mut self, request: &BuildRequest) -> Result<BuildOutcome, BuildError> {
        let (outcome, _) = self.run(request, Stage::Build)?;
        Ok(outcome)
    }

    /// Build `request` and load the library.
    pub fn compile(&mut self, request: &BuildRequest) -> Result<CompiledLibrary, BuildError> {
        let (outcome, library) = self.run(request, Stage::Load)?;
        library.ok_or_else(|| {
            BuildError::from(CompileError {
                messages: outcome.errors,
            })
        })
    }

    /// Delete the tracked build directory. Returns whether one existed.
    pub fn clean_build_dir(&mut self) -> Result<bool, BuildError> {
        Ok(self.cache.release()?)
    }

    fn run(
        &mut self,
        request: &BuildRequest,
        stage: Stage,
    ) -> Result<(BuildOutcome, Option<CompiledLibrary>), BuildError> {
        // Configuration problems surface before anything touches the disk.
        let plan = self.plan(request.toolchain())?;
        let cargo = self.runner.program()?;

        let (library_name, mut source) = match request.source() {
            SourcePayload::Code(code) => (self.namer.next_anonymous(), code.clone()),
            SourcePayload::File(path) => (name_for_file(path), read_to_string(path)?),
        };
        if let Some(hook) = &self.introspector {
            if let Some(declaration) = hook.registration(&source, &library_name) {
                source.push('\n');
                source.push_str(&declaration);
                source.push('\n');
            }
        }

        let manifest =
            Manifest::synthesize(request, &library_name, &self.config.base_dependencies())
                .to_toml()?;
        let cargo_config = CargoConfig::default().to_toml()?;

        let cache = request.cache();
        let quiet = request.quiet();
        let build_dir = self.cache.acquire(cache)?;
        let _guard = ReleaseGuard::new(&mut self.cache, !cache);

        write_package(&build_dir, &manifest, &cargo_config, &source)?;

        let command = CargoInvocation {
            cargo: &cargo,
            plan: &plan,
            build_dir: &build_dir,
            profile: request.profile(),
            features: request.features(),
            color: self.shell.use_color(),
            env: request.env(),
        }
        .command()?;

        if !quiet {
            self.shell.status(
                Status::Compiling,
                format!("{} [{}]", library_name, request.profile()),
            );
        }
        self.shell.verbose(Status::Info, command.display_command());

        let started = Instant::now();
        let processed = invoke(
            self.runner.as_ref(),
            &command,
            quiet,
            DiagnosticProcessor::new(&self.shell, quiet),
        )?;

        let artifact = processed.success.then(|| {
            artifact_path(
                &build_dir,
                &plan,
                request.profile(),
                &library_name,
                self.host.os,
            )
        });
        let outcome = BuildOutcome {
            success: processed.success,
            artifact,
            errors: processed.errors,
            warnings: processed.warnings,
            library_name,
            build_dir,
        };

        if stage == Stage::Build || !outcome.success {
            return Ok((outcome, None));
        }

        if !quiet {
            self.shell.status(
                Status::Finished,
                format!(
                    "{} in {}",
                    outcome.library_name,
                    format_duration(started.elapsed())
                ),
            );
        }

        let path = outcome
            .artifact
            .clone()
            .ok_or_else(|| ArtifactError::Missing {
                path: outcome.build_dir.clone(),
            })?;

        if let Some(previous) = self.loaded.remove(&path) {
            match Arc::try_unwrap(previous) {
                Ok(library) => library.close()?,
                Err(_) => tracing::debug!("{} is still referenced, not unloading", path.display()),
            }
        }

        let library = Arc::new(load_library(&path)?);
        self.loaded.insert(path.clone(), Arc::clone(&library));
        if !quiet {
            self.shell.status(Status::Loaded, path.display());
        }

        let bindings = match &self.bindings {
            Some(hook) => Some(hook.generate(&library, &outcome.library_name)?),
            None => None,
        };

        let compiled = CompiledLibrary {
            name: outcome.library_name.clone(),
            library,
            warnings: outcome.warnings.clone(),
            bindings,
        };
        Ok((outcome, Some(compiled)))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("cache", &self.cache)
            .field("built", &self.namer.count())
            .field("loaded", &self.loaded.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::builder::target::{CrtFlavor, HostOs, RuntimeInfo};
    use crate::core::dependency::DependencySpec;
    use crate::core::request::Profile;
    use crate::test_support::{
        compiler_message, system_library, write_source, ScriptedProbe, ScriptedRunner,
        ADD_SNIPPET,
    };
    use crate::util::shell::Verbosity;

    fn linux() -> HostDescriptor {
        HostDescriptor {
            os: HostOs::Linux,
            arch: "x86_64".to_string(),
            runtime: None,
        }
    }

    fn session(runner: Arc<ScriptedRunner>) -> (Session, Arc<Shell>) {
        let shell = Arc::new(Shell::capture(Verbosity::Normal));
        let session = Session::new(Config::default(), Arc::clone(&shell))
            .unwrap()
            .with_host(linux())
            .with_probe(ScriptedProbe::new())
            .with_runner(runner);
        (session, shell)
    }

    fn code(src: &str) -> BuildRequest {
        BuildRequest::code(src).build().unwrap()
    }

    #[test]
    fn test_manifest_is_union_of_base_and_user_dependencies() {
        let runner = Arc::new(ScriptedRunner::new(0));
        let (mut session, _) = session(runner);
        let request = BuildRequest::code(ADD_SNIPPET)
            .dependency("serde", "1.0")
            .build()
            .unwrap();

        let outcome = session.build(&request).unwrap();
        let manifest: toml::Table =
            toml::from_str(&std::fs::read_to_string(outcome.build_dir.join("Cargo.toml")).unwrap())
                .unwrap();
        let deps = manifest["dependencies"].as_table().unwrap();
        assert_eq!(deps["libc"].as_str(), Some("0.2"));
        assert_eq!(deps["serde"].as_str(), Some("1.0"));
    }

    #[test]
    fn test_cached_builds_reuse_directory_and_count_names() {
        let runner = Arc::new(ScriptedRunner::new(0));
        let (mut session, _) = session(runner.clone());

        let first = session.build(&code(ADD_SNIPPET)).unwrap();
        let second = session.build(&code(ADD_SNIPPET)).unwrap();

        assert_eq!(first.build_dir, second.build_dir);
        assert_eq!(first.library_name, "rustlet1");
        assert_eq!(second.library_name, "rustlet2");
        assert_eq!(runner.calls().len(), 2);
        assert_eq!(session.cache().releases(), 0);
    }

    #[test]
    fn test_file_named_like_anonymous_build_gets_own_artifact() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_source(tmp.path(), "rustlet1.rs", ADD_SNIPPET);
        let runner = Arc::new(ScriptedRunner::new(0));
        let (mut session, _) = session(runner);

        let anonymous = session.build(&code(ADD_SNIPPET)).unwrap();
        let from_file = session
            .build(&BuildRequest::file(&path).build().unwrap())
            .unwrap();

        assert_eq!(anonymous.build_dir, from_file.build_dir);
        assert_eq!(from_file.library_name, "file_rustlet1");
        assert_ne!(anonymous.artifact, from_file.artifact);
    }

    #[test]
    fn test_clean_exit_with_empty_stream_succeeds() {
        let runner = Arc::new(ScriptedRunner::new(0));
        let (mut session, _) = session(runner);

        let outcome = session.build(&code(ADD_SNIPPET)).unwrap();
        assert!(outcome.success);
        assert!(outcome.errors.is_empty());
        assert!(outcome.warnings.is_empty());
        assert_eq!(
            outcome.artifact,
            Some(outcome.build_dir.join("target/debug/librustlet1.so"))
        );
    }

    #[test]
    fn test_failed_build_reports_errors_after_warning() {
        let runner = Arc::new(ScriptedRunner::new(101).with_lines([
            compiler_message("error", "error[E0425]: cannot find value `x`"),
            compiler_message("warning", "warning: unused variable: `y`"),
            compiler_message("error", "error: aborting due to 1 previous error"),
        ]));
        let (mut session, shell) = session(runner);

        let outcome = session.build(&code("fn f() { x }")).unwrap();
        assert!(!outcome.success);
        assert!(outcome.artifact.is_none());
        assert_eq!(
            outcome.errors,
            vec![
                "error[E0425]: cannot find value `x`",
                "error: aborting due to 1 previous error"
            ]
        );
        assert!(shell
            .captured()
            .contains(&"warning: unused variable: `y`".to_string()));

        let err = session.compile(&code("fn f() { x }")).unwrap_err();
        match err {
            BuildError::Compile(e) => assert_eq!(e.messages.len(), 2),
            other => panic!("expected compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_without_messages_is_generic_compile_error() {
        let runner = Arc::new(ScriptedRunner::killed());
        let (mut session, _) = session(runner);
        let err = session.compile(&code(ADD_SNIPPET)).unwrap_err();
        assert!(matches!(err, BuildError::Compile(ref e) if e.messages.is_empty()));
    }

    #[test]
    fn test_windows_without_companion_fails_before_cargo() {
        let runner = Arc::new(ScriptedRunner::succeeding());
        let (session, _) = session(runner.clone());
        let mut session = session.with_host(HostDescriptor {
            os: HostOs::Windows,
            arch: "x86_64".to_string(),
            runtime: Some(RuntimeInfo {
                major: 4,
                minor: 3,
                crt: CrtFlavor::Ucrt,
            }),
        });

        let err = session.build(&code(ADD_SNIPPET)).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Config(ConfigError::MissingCompanionToolchain { .. })
        ));
        assert!(runner.calls().is_empty());
        assert!(session.cache().current().is_none());
    }

    #[test]
    fn test_uncached_build_releases_once_on_success_and_failure() {
        let ok = Arc::new(ScriptedRunner::new(0));
        let (mut session, _) = session(ok);
        let request = BuildRequest::code(ADD_SNIPPET).cache(false).build().unwrap();

        let outcome = session.build(&request).unwrap();
        assert!(!outcome.build_dir.exists());
        assert_eq!(session.cache().releases(), 1);
        assert!(session.cache().current().is_none());

        let failing = Arc::new(ScriptedRunner::new(101));
        let mut session = session.with_runner(failing);
        assert!(session.compile(&request).is_err());
        assert_eq!(session.cache().releases(), 2);
        assert!(session.cache().current().is_none());
    }

    #[test]
    fn test_file_source_uses_stem_and_profile_folder() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_source(tmp.path(), "my-lib.rs", ADD_SNIPPET);
        let runner = Arc::new(ScriptedRunner::new(0));
        let (mut session, _) = session(runner.clone());

        let request = BuildRequest::file(&path)
            .profile(Profile::Perf)
            .toolchain(Some("nightly".to_string()))
            .env("RUSTFLAGS", "-Dwarnings")
            .feature("fast", Vec::new())
            .build()
            .unwrap();
        let outcome = session.build(&request).unwrap();

        assert_eq!(outcome.library_name, "mylib");
        assert_eq!(
            outcome.artifact,
            Some(outcome.build_dir.join("target/perf/libmylib.so"))
        );
        assert_eq!(
            std::fs::read_to_string(outcome.build_dir.join("src/lib.rs")).unwrap(),
            ADD_SNIPPET
        );

        let call = &runner.calls()[0];
        assert_eq!(call.get_args()[0], "+nightly");
        assert!(call.get_args().contains(&"--profile=perf".to_string()));
        assert!(call.get_args().contains(&"--features=fast".to_string()));
        assert_eq!(call.get_env("RUSTFLAGS"), Some("-Dwarnings"));
    }

    #[test]
    fn test_missing_artifact_is_artifact_error() {
        let runner = Arc::new(ScriptedRunner::new(0));
        let (mut session, _) = session(runner);
        let err = session.compile(&code(ADD_SNIPPET)).unwrap_err();
        assert!(matches!(err, BuildError::Artifact(ArtifactError::Missing { .. })));
    }

    #[test]
    fn test_garbage_artifact_is_load_error() {
        let runner = Arc::new(ScriptedRunner::succeeding());
        let (mut session, _) = session(runner);
        let err = session.compile(&code(ADD_SNIPPET)).unwrap_err();
        assert!(matches!(err, BuildError::Artifact(ArtifactError::Load { .. })));
        assert_eq!(session.loaded_count(), 0);
    }

    struct Register;

    impl RegistrationIntrospector for Register {
        fn registration(&self, _source: &str, library_name: &str) -> Option<String> {
            Some(format!("// register {}", library_name))
        }
    }

    #[test]
    fn test_introspector_appends_declaration() {
        let runner = Arc::new(ScriptedRunner::new(0));
        let (session, _) = session(runner);
        let mut session = session.with_introspector(Register);

        let outcome = session.build(&code(ADD_SNIPPET)).unwrap();
        let written = std::fs::read_to_string(outcome.build_dir.join("src/lib.rs")).unwrap();
        assert!(written.starts_with(ADD_SNIPPET));
        assert!(written.ends_with("// register rustlet1\n"));
    }

    struct RecordingBindings {
        dir: PathBuf,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl BindingGenerator for RecordingBindings {
        fn generate(&self, library: &NativeLibrary, declaration: &str) -> anyhow::Result<PathBuf> {
            assert!(library.has_symbol("cos"));
            self.seen.lock().unwrap().push(declaration.to_string());
            let path = self.dir.join(format!("{}.wrappers", declaration));
            std::fs::write(&path, "cos\n")?;
            Ok(path)
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_compile_loads_and_reloads_library() {
        let Some(libm) = system_library() else {
            return;
        };
        let tmp = tempfile::TempDir::new().unwrap();
        let source = write_source(tmp.path(), "trig.rs", ADD_SNIPPET);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let runner = Arc::new(ScriptedRunner::new(0).with_artifact_link(libm));
        let (session, shell) = session(runner);
        let mut session = session.with_binding_generator(RecordingBindings {
            dir: tmp.path().to_path_buf(),
            seen: Arc::clone(&seen),
        });

        let request = BuildRequest::file(&source).build().unwrap();
        let first = session.compile(&request).unwrap();
        assert_eq!(first.name, "trig");
        assert!(first.library.has_symbol("cos"));
        assert_eq!(first.bindings, Some(tmp.path().join("trig.wrappers")));
        drop(first);

        let second = session.compile(&request).unwrap();
        assert_eq!(session.loaded_count(), 1);
        assert!(second.path().ends_with("target/debug/libtrig.so"));
        assert_eq!(*seen.lock().unwrap(), vec!["trig", "trig"]);
        assert!(shell.captured().iter().any(|l| l.contains("Loaded")));
    }

    #[test]
    fn test_preview_manifest_does_not_consume_names() {
        let runner = Arc::new(ScriptedRunner::new(0));
        let (mut session, _) = session(runner);
        let request = BuildRequest::code(ADD_SNIPPET)
            .dependency("rand", DependencySpec::version("0.8"))
            .build()
            .unwrap();

        let preview = session.preview_manifest(&request).unwrap();
        assert!(preview.contains("name = \"rustlet1\""));
        assert!(preview.contains("rand"));
        assert_eq!(session.build(&request).unwrap().library_name, "rustlet1");
    }

    #[test]
    fn test_clean_build_dir() {
        let runner = Arc::new(ScriptedRunner::new(0));
        let (mut session, _) = session(runner);
        let outcome = session.build(&code(ADD_SNIPPET)).unwrap();
        assert!(session.clean_build_dir().unwrap());
        assert!(!outcome.build_dir.exists());
        assert!(!session.clean_build_dir().unwrap());
    }
}
