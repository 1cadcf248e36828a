// src/workflow/builder.rs

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::artifact::{Dep, DependencyNode, canonicalize_depends_on};
use crate::checkpoint::{
    ConfirmPurge, NoopCheck, checkpoint_lfn, checkpoint_path, checkpoint_state, count_checkpoints,
    purge_checkpoints,
};
use crate::config::WorkflowConfig;
use crate::container::{Container, ContainerRemap, ContainerRun, PARAMS_FILE_NAME};
use crate::errors::{PlandagError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::locator::Locator;
use crate::parameters::Parameters;
use crate::resources::{ExecutionProfile, PartitionProvider, ResourceRequest};
use crate::scripts::{
    CondaScriptWriter, DockerScriptWriter, JobScriptWriter, RUN_SCRIPT_NAME, STDOUT_FILE_NAME,
    ScriptRequest, write_bash_script,
};
use crate::signature::{ArgumentPayload, JobSignature, Program, SignatureCache};
use crate::types::ProfileNamespace;
use crate::workflow::catalog::{
    FileRegistry, LogicalFile, TRANSFORMATION_VERSION, TransformationCatalog, TransformationEntry,
};
use crate::workflow::emit::{FinalizedWorkflow, WorkflowPlan};
use crate::workflow::graph::{JobGraph, JobNode};
use crate::workflow::options::JobOptions;

const SERVICES_ROOT: &str = "containers";

/// Builds one workflow graph.
///
/// Every scheduling call canonicalizes its dependencies, computes a
/// signature and either returns the node already scheduled for that
/// signature or builds a new one. [`finalize`](Self::finalize) consumes the
/// builder, so no job can be added to a finalized workflow.
pub struct WorkflowBuilder {
    config: WorkflowConfig,
    fs: Arc<dyn FileSystem>,
    partitions: Box<dyn PartitionProvider>,
    python_scripts: Box<dyn JobScriptWriter>,
    container_scripts: Box<dyn JobScriptWriter>,
    services_scripts: DockerScriptWriter,
    graph: JobGraph,
    signatures: SignatureCache,
    files: FileRegistry,
    transformations: TransformationCatalog,
    services: HashMap<String, StartedService>,
}

/// A service whose start job is scheduled in this session.
struct StartedService {
    args: String,
    node: DependencyNode,
}

/// A job whose script is written, ready to become a graph node.
struct PendingJob {
    locator: Locator,
    job_id: String,
    job_dir: PathBuf,
    transformation: String,
    arguments: Vec<String>,
    profile: ExecutionProfile,
    depends_on: BTreeSet<DependencyNode>,
}

impl WorkflowBuilder {
    pub fn from_config(config: WorkflowConfig) -> Self {
        let partitions = Box::new(config.partitions.clone());
        let python_scripts = Box::new(CondaScriptWriter::new(config.conda.clone()));
        Self {
            config,
            fs: Arc::new(RealFileSystem),
            partitions,
            python_scripts,
            container_scripts: Box::new(DockerScriptWriter::new()),
            services_scripts: DockerScriptWriter::new(),
            graph: JobGraph::new(),
            signatures: SignatureCache::new(),
            files: FileRegistry::new(),
            transformations: TransformationCatalog::new(),
            services: HashMap::new(),
        }
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_partitions(mut self, partitions: impl PartitionProvider + 'static) -> Self {
        self.partitions = Box::new(partitions);
        self
    }

    pub fn with_python_script_writer(mut self, writer: impl JobScriptWriter + 'static) -> Self {
        self.python_scripts = Box::new(writer);
        self
    }

    pub fn with_container_script_writer(
        mut self,
        writer: impl JobScriptWriter + 'static,
    ) -> Self {
        self.container_scripts = Box::new(writer);
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn graph(&self) -> &JobGraph {
        &self.graph
    }

    pub fn file_system(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn file_registry(&self) -> &FileRegistry {
        &self.files
    }

    /// Working directory of the job at `locator`, created if missing.
    pub fn directory_for(&self, locator: &Locator) -> Result<PathBuf> {
        let dir = locator.to_working_directory(&self.config.directory);
        self.fs.create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Engine job id for `locator`.
    pub fn job_name_for(&self, locator: &Locator) -> String {
        locator.to_job_id(self.config.experiment_name.as_deref())
    }

    /// Declare a logical file; see [`FileRegistry::create_file`].
    pub fn create_file(
        &mut self,
        lfn: &str,
        pfn: impl AsRef<Path>,
        register_replica: bool,
    ) -> LogicalFile {
        self.files
            .create_file(lfn, pfn.as_ref(), Some(self.config.site.as_str()), register_replica)
    }

    pub fn get_file(&self, lfn: &str) -> Result<LogicalFile> {
        self.files.get_file(lfn)
    }

    /// The workflow default merged with `request`, if given.
    pub fn resolve_resource_request(
        &self,
        request: Option<&ResourceRequest>,
    ) -> Result<ResourceRequest> {
        match request {
            Some(request) => self.config.default_resources.unify(request),
            None => Ok(self.config.default_resources.clone()),
        }
    }

    /// Cap how many jobs in `category` the engine runs at once.
    pub fn limit_jobs_for_category(&mut self, category: &str, max_jobs: u32) {
        debug!(category, max_jobs, "limiting category");
        self.graph.set_category_limit(category, max_jobs);
    }

    /// Register a container in the transformation catalog.
    pub fn add_container(
        &mut self,
        name: &str,
        container_type: &str,
        image: &str,
    ) -> Result<Container> {
        let container = Container::new(name, container_type, image)?;
        Ok(self.register_container(container))
    }

    /// Register an already-built container (e.g. one with mounts).
    pub fn register_container(&mut self, container: Container) -> Container {
        info!(container = %container.name, kind = %container.container_type, "registering container");
        self.transformations.add_container(container.clone());
        container
    }

    /// Run a Python program on a structured parameter file.
    pub fn run_python_on_parameters(
        &mut self,
        locator: &Locator,
        program: &Program,
        parameters: &Parameters,
        depends_on: impl Into<Dep>,
        options: JobOptions,
    ) -> Result<DependencyNode> {
        let payload = ArgumentPayload::Parameters(parameters.clone());
        self.schedule_python(locator, program, payload, depends_on.into(), options)
    }

    /// Run a Python program with a literal argument string.
    pub fn run_python_on_args(
        &mut self,
        locator: &Locator,
        program: &Program,
        args: &str,
        depends_on: impl Into<Dep>,
        options: JobOptions,
    ) -> Result<DependencyNode> {
        let payload = ArgumentPayload::Args(args.to_string());
        self.schedule_python(locator, program, payload, depends_on.into(), options)
    }

    /// Run shell commands, in order, as one job.
    pub fn run_bash<I, S>(
        &mut self,
        locator: &Locator,
        commands: I,
        depends_on: impl Into<Dep>,
        options: JobOptions,
    ) -> Result<DependencyNode>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let commands: Vec<String> = commands.into_iter().map(Into::into).collect();
        let depends_on = canonicalize_depends_on(&depends_on.into())?;
        let signature =
            JobSignature::from_fields(&["bash", &locator.to_name(), &commands.join("\n")]);
        self.schedule_or_reuse(locator, signature, |builder| {
            builder.build_bash_job(locator, &commands, depends_on, options)
        })
    }

    /// Run an explicit container command.
    pub fn run_container(
        &mut self,
        locator: &Locator,
        run: &ContainerRun,
        depends_on: impl Into<Dep>,
        options: JobOptions,
    ) -> Result<DependencyNode> {
        let depends_on = canonicalize_depends_on(&depends_on.into())?;
        self.schedule_container(locator, run.clone(), depends_on, options, None)
    }

    /// Schedule a job that starts `container` as a background service.
    ///
    /// Dependencies and resources are checked before the start/stop scripts
    /// are written. Starting the same service again with the same arguments
    /// returns the first start job.
    pub fn start_container_service(
        &mut self,
        container: &Container,
        depends_on: impl Into<Dep>,
        mounts: &[String],
        docker_args: &str,
        resource_request: Option<ResourceRequest>,
    ) -> Result<DependencyNode> {
        let service = service_locator(container)?;
        let start_locator = service.join("start")?;

        let mut args = docker_args.trim().to_string();
        for mount in mounts {
            args.push_str(&format!(" -v {mount}"));
        }
        if let Some(started) = self.services.get(&container.name) {
            if started.args == args {
                return Ok(started.node.clone());
            }
            return Err(PlandagError::DuplicateLocator {
                locator: start_locator.to_string(),
                job_id: self.job_name_for(&start_locator),
            });
        }

        let depends_on = depends_on.into();
        canonicalize_depends_on(&depends_on)?;
        let options = JobOptions {
            resource_request,
            ..JobOptions::default()
        };
        self.job_profile(&self.job_name_for(&start_locator), &options)?;

        let dir = self.directory_for(&service)?;
        let (start, _stop) = self.services_scripts.write_service_scripts(
            self.fs.as_ref(),
            &container.name,
            container.image_archive(),
            &args,
            &dir.join("start.sh"),
            &dir.join("stop.sh"),
        )?;

        let node = self.run_bash(
            &start_locator,
            [start.display().to_string()],
            depends_on,
            options,
        )?;
        self.services.insert(
            container.name.clone(),
            StartedService {
                args,
                node: node.clone(),
            },
        );
        Ok(node)
    }

    /// Schedule a job that stops a service started with
    /// [`start_container_service`](Self::start_container_service).
    pub fn stop_container_service(
        &mut self,
        container: &Container,
        depends_on: impl Into<Dep>,
        resource_request: Option<ResourceRequest>,
    ) -> Result<DependencyNode> {
        if !self.services.contains_key(&container.name) {
            return Err(PlandagError::StaleServiceReference(container.name.clone()));
        }
        let service = service_locator(container)?;
        let stop = self.directory_for(&service)?.join("stop.sh");

        let options = JobOptions {
            resource_request,
            ..JobOptions::default()
        };
        self.run_bash(
            &service.join("stop")?,
            [stop.display().to_string()],
            depends_on,
            options,
        )
    }

    /// Write the plan and catalogs under `output_dir` (default: the
    /// workflow directory).
    ///
    /// When the no-op check is enabled and every job already has a
    /// checkpoint, `confirm` decides whether the checkpoints are purged
    /// first. Declining leaves everything as it was.
    pub fn finalize(
        mut self,
        output_dir: Option<&Path>,
        confirm: &mut dyn ConfirmPurge,
    ) -> Result<FinalizedWorkflow> {
        let output_dir = output_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.directory.clone());
        self.fs.create_dir_all(&output_dir)?;

        let noop_check = if self.config.noop_check {
            Some(NoopCheck {
                num_jobs: self.graph.job_count(),
                num_checkpoints: count_checkpoints(self.fs.as_ref(), &output_dir)?,
            })
        } else {
            None
        };

        let mut purged = false;
        if let Some(check) = noop_check.filter(NoopCheck::looks_like_noop) {
            warn!(
                jobs = check.num_jobs,
                checkpoints = check.num_checkpoints,
                "every job is already checkpointed; this workflow would do nothing"
            );
            if confirm.confirm_purge(&check) {
                purge_checkpoints(self.fs.as_ref(), &output_dir)?;
                self.files.drop_checkpoint_replicas();
                self.graph.mark_all_pending();
                purged = true;
            }
        }

        let plan = WorkflowPlan::snapshot(
            &self.config,
            &self.graph,
            &self.files,
            &self.transformations,
            &output_dir,
        )?;
        let written = plan.write(self.fs.as_ref(), &output_dir)?;
        info!(
            workflow = %self.config.name,
            jobs = plan.jobs.len(),
            plan = %written.plan.display(),
            "workflow finalized"
        );

        Ok(FinalizedWorkflow {
            plan,
            written,
            noop_check,
            purged,
        })
    }

    fn schedule_or_reuse<F>(
        &mut self,
        locator: &Locator,
        signature: JobSignature,
        build: F,
    ) -> Result<DependencyNode>
    where
        F: FnOnce(&mut Self) -> Result<DependencyNode>,
    {
        if let Some(existing) = self.signatures.get(&signature) {
            info!(job = %locator, signature = %signature, "job recognized as a duplicate");
            return Ok(existing.clone());
        }
        if let Some(taken) = self.graph.find_by_locator(locator) {
            let job_id = self
                .graph
                .job(taken)
                .map(|job| job.job_id.clone())
                .unwrap_or_default();
            return Err(PlandagError::DuplicateLocator {
                locator: locator.to_string(),
                job_id,
            });
        }
        let node = build(self)?;
        self.signatures.insert(signature, node.clone());
        info!(job = %locator, "scheduled job");
        Ok(node)
    }

    fn schedule_python(
        &mut self,
        locator: &Locator,
        program: &Program,
        payload: ArgumentPayload,
        depends_on: Dep,
        options: JobOptions,
    ) -> Result<DependencyNode> {
        let depends_on = canonicalize_depends_on(&depends_on)?;
        if let Some(container) = options.container.clone() {
            return self.schedule_python_in_container(
                locator, program, payload, &container, depends_on, options,
            );
        }
        let signature = JobSignature::compute(&program.identity(), &payload)?;
        self.schedule_or_reuse(locator, signature, |builder| {
            builder.build_python_job(locator, program, &payload, depends_on, options)
        })
    }

    fn build_python_job(
        &mut self,
        locator: &Locator,
        program: &Program,
        payload: &ArgumentPayload,
        depends_on: BTreeSet<DependencyNode>,
        options: JobOptions,
    ) -> Result<DependencyNode> {
        let job_id = self.job_name_for(locator);
        let profile = self.job_profile(&job_id, &options)?;
        let job_dir = self.directory_for(locator)?;

        let args = match payload {
            ArgumentPayload::Parameters(params) => {
                let params_path = job_dir.join(PARAMS_FILE_NAME);
                self.fs.write(&params_path, params.to_toml()?.as_bytes())?;
                params_path.display().to_string()
            }
            ArgumentPayload::Args(args) => args.clone(),
        };
        let interpreter = if options.use_pypy { "pypy3" } else { "python" };
        let entry_point = format!("{interpreter} {} {args}", program.invocation())
            .trim_end()
            .to_string();

        let request = script_request(&job_dir, entry_point, &options);
        let script = self
            .python_scripts
            .write_script(self.fs.as_ref(), &request)?;
        let transformation = self.add_script_transformation(&job_id, &script);

        self.add_job(PendingJob {
            locator: locator.clone(),
            job_id,
            job_dir,
            transformation,
            arguments: Vec::new(),
            profile,
            depends_on,
        })
    }

    /// Remap files and arguments into the container, then schedule it as a
    /// container job. Collisions fail before anything is written.
    fn schedule_python_in_container(
        &mut self,
        locator: &Locator,
        program: &Program,
        payload: ArgumentPayload,
        container: &Container,
        depends_on: BTreeSet<DependencyNode>,
        mut options: JobOptions,
    ) -> Result<DependencyNode> {
        let settings = &self.config.container;
        let staging_dir = settings.staging_directory(&self.config.name, locator);
        let remap = ContainerRemap::plan(
            locator,
            &staging_dir,
            &settings.mount_root,
            &options.input_files,
            &options.output_files,
        )?;

        let job_dir = locator.to_working_directory(&self.config.directory);
        let (python_args, staged) = match payload {
            ArgumentPayload::Parameters(params) => {
                let mapping = remap.params_file(&job_dir.join(PARAMS_FILE_NAME));
                let arg = mapping.in_container.display().to_string();
                (arg, Some((mapping, remap.rewrite_parameters(&params))))
            }
            ArgumentPayload::Args(args) => (remap.rewrite_args(&args), None),
        };
        let command = format!(
            "{} {} {python_args}",
            settings.python.display(),
            program.invocation()
        )
        .trim_end()
        .to_string();

        options.pre_job =
            remap.pre_job_commands(staged.as_ref().map(|(mapping, _)| mapping), &options.pre_job);
        options.post_job = remap.post_job_commands(&options.post_job);
        let run = ContainerRun::for_container(container, &remap.docker_args(""), &command);

        let staged = staged.map(|(mapping, params)| (mapping.host, params));
        self.schedule_container(locator, run, depends_on, options, staged)
    }

    fn schedule_container(
        &mut self,
        locator: &Locator,
        run: ContainerRun,
        depends_on: BTreeSet<DependencyNode>,
        options: JobOptions,
        staged_params: Option<(PathBuf, Parameters)>,
    ) -> Result<DependencyNode> {
        let staged = staged_params
            .map(|(path, params)| params.to_toml().map(|text| (path, text)))
            .transpose()?;
        let params_text = staged.as_ref().map(|(_, text)| text.as_str()).unwrap_or("");
        let signature = JobSignature::from_fields(&[
            "container",
            &run.image,
            &run.docker_args,
            &run.command,
            params_text,
        ]);
        self.schedule_or_reuse(locator, signature, |builder| {
            builder.build_container_job(locator, &run, depends_on, options, staged)
        })
    }

    fn build_container_job(
        &mut self,
        locator: &Locator,
        run: &ContainerRun,
        depends_on: BTreeSet<DependencyNode>,
        options: JobOptions,
        staged_params: Option<(PathBuf, String)>,
    ) -> Result<DependencyNode> {
        let job_id = self.job_name_for(locator);
        let profile = self.job_profile(&job_id, &options)?;
        let job_dir = self.directory_for(locator)?;

        if let Some((path, text)) = staged_params {
            self.fs.write(&path, text.as_bytes())?;
        }

        let entry_point = DockerScriptWriter::run_command(&run.image, &run.docker_args, &run.command);
        let mut request = script_request(&job_dir, entry_point, &options);
        if let Some(archive) = run.image_archive.as_deref() {
            request.pre_job.insert(0, DockerScriptWriter::load_command(archive));
        }
        let script = self
            .container_scripts
            .write_script(self.fs.as_ref(), &request)?;
        let transformation = self.add_script_transformation(&job_id, &script);

        self.add_job(PendingJob {
            locator: locator.clone(),
            job_id,
            job_dir,
            transformation,
            arguments: Vec::new(),
            profile,
            depends_on,
        })
    }

    fn build_bash_job(
        &mut self,
        locator: &Locator,
        commands: &[String],
        depends_on: BTreeSet<DependencyNode>,
        options: JobOptions,
    ) -> Result<DependencyNode> {
        let job_id = self.job_name_for(locator);
        let profile = self.job_profile(&job_id, &options)?;
        let job_dir = self.directory_for(locator)?;

        let lines: Vec<String> = options
            .pre_job
            .iter()
            .chain(commands)
            .chain(&options.post_job)
            .cloned()
            .collect();
        let script = write_bash_script(
            self.fs.as_ref(),
            &job_dir,
            &lines,
            &checkpoint_path(&job_dir),
        )?;
        let transformation = self.transformations.bash(
            Some(self.config.namespace.as_str()),
            &self.config.site,
            options.container.as_ref().map(|c| c.name.as_str()),
        );

        self.add_job(PendingJob {
            locator: locator.clone(),
            job_id,
            job_dir,
            transformation,
            arguments: vec![script.display().to_string()],
            profile,
            depends_on,
        })
    }

    /// Category, resources, retries, then the caller's own profiles.
    fn job_profile(&self, job_id: &str, options: &JobOptions) -> Result<ExecutionProfile> {
        let mut profile = ExecutionProfile::new();
        if let Some(category) = options.category.as_deref() {
            profile.set(ProfileNamespace::Dagman, "category", category);
        }
        let request = self.resolve_resource_request(options.resource_request.as_ref())?;
        request.apply_to_job(&mut profile, job_id, self.partitions.as_ref())?;
        if options.retries > 0 {
            profile.set(ProfileNamespace::Dagman, "retry", options.retries.to_string());
        }
        for extra in &options.profiles {
            profile.add(extra);
        }
        Ok(profile)
    }

    fn add_script_transformation(&mut self, job_id: &str, script: &Path) -> String {
        self.transformations.add(TransformationEntry {
            name: job_id.to_string(),
            namespace: Some(self.config.namespace.clone()),
            version: TRANSFORMATION_VERSION.to_string(),
            site: self.config.site.clone(),
            pfn: script.to_path_buf(),
            container: None,
        });
        job_id.to_string()
    }

    /// Resolve the checkpoint, add the node and wire one edge per parent.
    fn add_job(&mut self, job: PendingJob) -> Result<DependencyNode> {
        let ckpt_path = checkpoint_path(&job.job_dir);
        let state = checkpoint_state(self.fs.as_ref(), &ckpt_path);
        let ckpt_file = self.files.create_file(
            &checkpoint_lfn(&job.locator),
            &ckpt_path,
            Some(self.config.site.as_str()),
            state.is_preexisting(),
        );
        if state.is_preexisting() {
            debug!(job = %job.locator, "checkpoint exists; registered as pre-existing replica");
        }

        let inputs = job
            .depends_on
            .iter()
            .flat_map(|parent| parent.outputs().iter().cloned())
            .collect();
        let id = self.graph.add_job(JobNode {
            locator: job.locator,
            job_id: job.job_id,
            transformation: job.transformation,
            arguments: job.arguments,
            profile: job.profile,
            inputs,
            outputs: vec![ckpt_file.clone()],
            checkpoint: state,
        });
        for parent in &job.depends_on {
            self.graph.add_dependency(parent, id);
        }
        Ok(DependencyNode::new(id, vec![ckpt_file]))
    }
}

fn service_locator(container: &Container) -> Result<Locator> {
    Locator::new([SERVICES_ROOT])?.join(&container.name)
}

fn script_request(job_dir: &Path, entry_point: String, options: &JobOptions) -> ScriptRequest {
    ScriptRequest {
        working_directory: job_dir.to_path_buf(),
        script_path: job_dir.join(RUN_SCRIPT_NAME),
        entry_point,
        stdout_file: job_dir.join(STDOUT_FILE_NAME),
        checkpoint: checkpoint_path(job_dir),
        pre_job: options.pre_job.clone(),
        post_job: options.post_job.clone(),
        conda: options.conda.clone(),
    }
}
