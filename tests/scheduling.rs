mod common;

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use crate::common::{ROOT, WorkflowConfigBuilder, init_tracing, loc, mock_builder, mock_builder_with};
use plandag::artifact::Dep;
use plandag::checkpoint::NeverPurge;
use plandag::container::{Container, ContainerRun};
use plandag::errors::PlandagError;
use plandag::fs::FileSystem;
use plandag::fs::mock::MockFileSystem;
use plandag::parameters::Parameters;
use plandag::resources::{PartitionTable, Profile, SlurmResourceRequest};
use plandag::scripts::{CondaConfiguration, CondaScriptWriter, DockerScriptWriter};
use plandag::signature::{ArgumentPayload, JobSignature, Program};
use plandag::types::ProfileNamespace;
use plandag::workflow::{JobOptions, WorkflowBuilder};
use plandag_test_utils::writers::{CountingScriptWriter, calls};

type TestResult = Result<(), Box<dyn Error>>;

fn counting_builder() -> (WorkflowBuilder, MockFileSystem, Arc<std::sync::atomic::AtomicUsize>) {
    let (builder, fs) = mock_builder();
    let writer = CountingScriptWriter::new(CondaScriptWriter::new(None));
    let counter = writer.counter();
    (builder.with_python_script_writer(writer), fs, counter)
}

fn multiply_params(x: i64) -> Parameters {
    Parameters::new()
        .with("input_file", Path::new("/work/in.txt"))
        .with("output_file", Path::new("/work/out.txt"))
        .with("x", x)
}

#[test]
fn identical_calls_return_the_same_node() -> TestResult {
    init_tracing();
    let (mut builder, _fs, counter) = counting_builder();
    let program = Program::module("pkg.multiply");

    let first = builder.run_python_on_parameters(
        &loc("jobs/multiply"),
        &program,
        &multiply_params(4),
        Dep::none(),
        JobOptions::new(),
    )?;
    let second = builder.run_python_on_parameters(
        &loc("jobs/multiply"),
        &program,
        &multiply_params(4),
        Dep::none(),
        JobOptions::new(),
    )?;

    assert_eq!(first, second);
    assert_eq!(first.job(), second.job());
    assert_eq!(builder.graph().job_count(), 1);
    assert_eq!(calls(&counter), 1, "the duplicate must not write a script");
    Ok(())
}

#[test]
fn parameter_insertion_order_does_not_matter() -> TestResult {
    init_tracing();
    let (mut builder, _fs, _counter) = counting_builder();
    let program = Program::module("pkg.multiply");

    let forward: Parameters = [("a", 1), ("b", 2)].into_iter().collect();
    let backward: Parameters = [("b", 2), ("a", 1)].into_iter().collect();

    let first = builder.run_python_on_parameters(
        &loc("jobs/x"),
        &program,
        &forward,
        Dep::none(),
        JobOptions::new(),
    )?;
    let second = builder.run_python_on_parameters(
        &loc("jobs/y"),
        &program,
        &backward,
        Dep::none(),
        JobOptions::new(),
    )?;

    assert_eq!(first, second);
    assert_eq!(builder.graph().job_count(), 1);
    Ok(())
}

#[test]
fn different_parameters_or_programs_are_distinct_jobs() -> TestResult {
    init_tracing();
    let (mut builder, _fs, counter) = counting_builder();

    let a = builder.run_python_on_parameters(
        &loc("jobs/a"),
        &Program::module("pkg.multiply"),
        &multiply_params(4),
        Dep::none(),
        JobOptions::new(),
    )?;
    let b = builder.run_python_on_parameters(
        &loc("jobs/b"),
        &Program::module("pkg.multiply"),
        &multiply_params(5),
        Dep::none(),
        JobOptions::new(),
    )?;
    let c = builder.run_python_on_parameters(
        &loc("jobs/c"),
        &Program::script("/opt/multiply.py"),
        &multiply_params(4),
        Dep::none(),
        JobOptions::new(),
    )?;

    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_eq!(builder.graph().job_count(), 3);
    assert_eq!(calls(&counter), 3);
    Ok(())
}

#[test]
fn args_and_parameters_never_share_a_signature() -> TestResult {
    init_tracing();

    let identity = Program::module("pkg.m").identity();
    let params = Parameters::new().with("x", 1);
    let as_text = params.to_toml()?;

    let from_params = JobSignature::compute(&identity, &ArgumentPayload::Parameters(params))?;
    let from_args = JobSignature::compute(&identity, &ArgumentPayload::Args(as_text))?;
    assert_ne!(from_params, from_args);

    assert_ne!(
        JobSignature::from_fields(&["ab", "c"]),
        JobSignature::from_fields(&["a", "bc"])
    );
    Ok(())
}

#[test]
fn python_job_writes_parameter_file_and_run_script() -> TestResult {
    init_tracing();
    let (mut builder, fs) = mock_builder();

    builder.run_python_on_parameters(
        &loc("jobs/multiply"),
        &Program::module("pkg.multiply"),
        &multiply_params(4),
        Dep::none(),
        JobOptions::new().pre_job("echo before").post_job("echo after"),
    )?;

    let params = fs.read_to_string(Path::new("/work/jobs/multiply/____params.params"))?;
    assert!(params.contains("x = 4"));
    assert!(params.contains("input_file = \"/work/in.txt\""));

    let script_path = Path::new("/work/jobs/multiply/___run.sh");
    assert!(fs.is_executable(script_path));
    let script = fs.read_to_string(script_path)?;
    let lines: Vec<&str> = script.lines().collect();
    let position = |needle: &str| {
        lines
            .iter()
            .position(|l| l.starts_with(needle))
            .unwrap_or_else(|| panic!("missing line starting with {needle:?} in:\n{script}"))
    };
    assert!(position("cd /work/jobs/multiply") < position("echo before"));
    assert!(position("echo before") < position("python -m pkg.multiply"));
    assert!(position("python -m pkg.multiply") < position("echo after"));
    assert!(position("echo after") < position("touch /work/jobs/multiply/___ckpt"));
    assert!(script.contains(
        "python -m pkg.multiply /work/jobs/multiply/____params.params 2>&1 | tee /work/jobs/multiply/___stdout.log"
    ));
    Ok(())
}

#[test]
fn conda_and_pypy_options_shape_the_script() -> TestResult {
    init_tracing();
    let (mut builder, fs) = mock_builder();

    builder.run_python_on_args(
        &loc("jobs/fast"),
        &Program::script("/opt/tool.py"),
        "--n 3",
        Dep::none(),
        JobOptions::new()
            .use_pypy(true)
            .conda(CondaConfiguration::new("/opt/conda", "env1")),
    )?;

    let script = fs.read_to_string(Path::new("/work/jobs/fast/___run.sh"))?;
    assert!(script.contains("source /opt/conda/etc/profile.d/conda.sh"));
    assert!(script.contains("conda activate env1"));
    assert!(script.contains("pypy3 /opt/tool.py --n 3 2>&1"));
    Ok(())
}

#[test]
fn job_profile_combines_category_retries_and_extra_profiles() -> TestResult {
    init_tracing();
    let (mut builder, _fs) = mock_builder();

    let node = builder.run_python_on_args(
        &loc("jobs/p"),
        &Program::module("pkg.p"),
        "",
        Dep::none(),
        JobOptions::new()
            .category("gpu")
            .retries(3)
            .resource_request(SlurmResourceRequest::new().with_num_gpus(1))
            .profile(Profile::parse("env", "OMP_NUM_THREADS", "4")?),
    )?;

    let job = builder.graph().job(node.job()).ok_or("job missing")?;
    assert_eq!(job.profile.category(), Some("gpu"));
    assert_eq!(job.profile.get(ProfileNamespace::Dagman, "retry"), Some("3"));
    assert_eq!(job.profile.get(ProfileNamespace::Env, "OMP_NUM_THREADS"), Some("4"));
    let glite = job
        .profile
        .get(ProfileNamespace::Pegasus, "glite.arguments")
        .ok_or("no glite arguments")?;
    assert!(glite.contains("--gpus-per-task 1"));
    assert!(glite.contains("--qos scavenge"));
    Ok(())
}

#[test]
fn experiment_name_prefixes_job_ids() -> TestResult {
    init_tracing();
    let (mut builder, _fs) =
        mock_builder_with(WorkflowConfigBuilder::new(Path::new(ROOT)).experiment("exp7"));

    let node = builder.run_bash(&loc("jobs/a"), ["true"], Dep::none(), JobOptions::new())?;

    let job = builder.graph().job(node.job()).ok_or("job missing")?;
    assert_eq!(job.job_id, "exp7_jobs_a");
    assert_eq!(builder.job_name_for(&loc("x/y")), "exp7_x_y");
    Ok(())
}

#[test]
fn bash_jobs_dedup_by_locator_and_commands() -> TestResult {
    init_tracing();
    let (mut builder, fs) = mock_builder();

    let a = builder.run_bash(&loc("jobs/a"), ["echo hi"], Dep::none(), JobOptions::new())?;
    let again = builder.run_bash(&loc("jobs/a"), ["echo hi"], Dep::none(), JobOptions::new())?;
    let elsewhere = builder.run_bash(&loc("jobs/b"), ["echo hi"], Dep::none(), JobOptions::new())?;

    assert_eq!(a, again);
    assert_ne!(a, elsewhere);
    assert_eq!(builder.graph().job_count(), 2);

    let job = builder.graph().job(a.job()).ok_or("job missing")?;
    assert_eq!(job.transformation, "bash");
    assert_eq!(job.arguments, vec!["/work/jobs/a/script.sh".to_string()]);
    let script = fs.read_to_string(Path::new("/work/jobs/a/script.sh"))?;
    assert!(script.contains("echo hi\ntouch /work/jobs/a/___ckpt"));
    Ok(())
}

#[test]
fn dependencies_become_edges_and_inputs() -> TestResult {
    init_tracing();
    let (mut builder, _fs) = mock_builder();

    let a = builder.run_bash(&loc("jobs/a"), ["echo a"], Dep::none(), JobOptions::new())?;
    let b = builder.run_bash(&loc("jobs/b"), ["echo b"], Dep::none(), JobOptions::new())?;
    let c = builder.run_bash(
        &loc("jobs/c"),
        ["echo c"],
        vec![a.clone(), b.clone(), a.clone()],
        JobOptions::new(),
    )?;

    let graph = builder.graph();
    assert_eq!(graph.edge_count(), 2);
    let child = graph.job(c.job()).ok_or("job missing")?;
    let inputs: Vec<&str> = child.inputs.iter().map(|f| f.name()).collect();
    assert_eq!(inputs, vec!["jobs/a/___ckpt", "jobs/b/___ckpt"]);
    assert_eq!(graph.find_by_locator(&loc("jobs/c")), Some(c.job()));
    Ok(())
}

#[test]
fn container_run_loads_archived_images() -> TestResult {
    init_tracing();
    let (mut builder, fs) = mock_builder();

    let run = ContainerRun::new("tools:1.0", "--rm", "echo hi").with_image_archive("/images/tools.tar");
    builder.run_container(&loc("jobs/tool"), &run, Dep::none(), JobOptions::new())?;
    let again = builder.run_container(&loc("jobs/tool2"), &run, Dep::none(), JobOptions::new())?;

    assert_eq!(builder.graph().job_count(), 1, "same run is deduplicated: {again:?}");
    let script = fs.read_to_string(Path::new("/work/jobs/tool/___run.sh"))?;
    let load = script.find("docker load --input /images/tools.tar").ok_or("no load")?;
    let run_at = script.find("docker run --rm tools:1.0 echo hi").ok_or("no run")?;
    assert!(load < run_at);
    Ok(())
}

#[test]
fn unknown_container_type_is_rejected() {
    init_tracing();
    let (mut builder, _fs) = mock_builder();

    match builder.add_container("c", "podman", "img") {
        Err(PlandagError::UnknownContainerType(kind)) => assert_eq!(kind, "podman"),
        other => panic!("Expected UnknownContainerType, got {:?}", other),
    }
}

#[test]
fn stopping_a_service_that_never_started_fails() -> TestResult {
    init_tracing();
    let (mut builder, _fs) = mock_builder();
    let container = builder.add_container("mongo", "docker", "mongo")?;

    match builder.stop_container_service(&container, Dep::none(), None) {
        Err(PlandagError::StaleServiceReference(name)) => assert_eq!(name, "mongo"),
        other => panic!("Expected StaleServiceReference, got {:?}", other),
    }
    Ok(())
}

#[test]
fn service_start_and_stop_scripts() -> TestResult {
    init_tracing();
    let (mut builder, fs) = mock_builder();
    let container = builder.add_container("mongo", "docker", "/images/mongo.tar")?;

    let start = builder.start_container_service(
        &container,
        Dep::none(),
        &["/data/db:/data/db".to_string()],
        "-p 27017:27017",
        None,
    )?;
    let stop = builder.stop_container_service(&container, &start, None)?;

    let start_script = fs.read_to_string(Path::new("/work/containers/mongo/start.sh"))?;
    assert!(start_script.contains("docker load --input /images/mongo.tar"));
    assert!(start_script.contains("docker run -d --name mongo -p 27017:27017 -v /data/db:/data/db mongo"));
    let stop_script = fs.read_to_string(Path::new("/work/containers/mongo/stop.sh"))?;
    assert!(stop_script.contains("docker stop mongo"));
    assert!(fs.is_executable("/work/containers/mongo/start.sh"));

    let graph = builder.graph();
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(
        graph.find_by_locator(&loc("containers/mongo/stop")),
        Some(stop.job())
    );
    Ok(())
}

#[test]
fn unknown_logical_file_is_reported() -> TestResult {
    init_tracing();
    let (mut builder, _fs) = mock_builder();

    assert!(matches!(builder.get_file("missing.txt"), Err(PlandagError::UnknownFile(_))));
    let created = builder.create_file("input.txt", "/work/input.txt", true);
    assert_eq!(builder.get_file("input.txt")?, created);
    assert_eq!(builder.file_registry().replicas().len(), 1);
    Ok(())
}

#[test]
fn category_limits_reach_the_properties_file() -> TestResult {
    init_tracing();
    let (mut builder, fs) = mock_builder();

    builder.run_bash(&loc("jobs/a"), ["true"], Dep::none(), JobOptions::new().category("io"))?;
    builder.limit_jobs_for_category("io", 2);
    builder.limit_jobs_for_category("io", 3);

    let finalized = builder.finalize(None, &mut NeverPurge)?;
    assert_eq!(finalized.plan.category_limit_lines(), vec!["dagman.io.maxjobs = 3"]);

    let properties = fs.read_to_string(&finalized.written.properties)?;
    assert!(properties.contains("dagman.io.maxjobs = 3\n"));
    assert!(properties.contains("pegasus.data.configuration = sharedfs"));
    Ok(())
}

#[test]
fn different_job_at_a_taken_locator_fails() -> TestResult {
    init_tracing();
    let (mut builder, fs, counter) = counting_builder();

    builder.run_python_on_args(
        &loc("jobs/a"),
        &Program::module("pkg.first"),
        "--n 1",
        Dep::none(),
        JobOptions::new(),
    )?;
    let second = builder.run_python_on_args(
        &loc("jobs/a"),
        &Program::module("pkg.second"),
        "--n 1",
        Dep::none(),
        JobOptions::new(),
    );

    match second {
        Err(PlandagError::DuplicateLocator { locator, job_id }) => {
            assert_eq!(locator, "jobs/a");
            assert_eq!(job_id, "jobs_a");
        }
        other => panic!("Expected DuplicateLocator, got {:?}", other),
    }
    assert_eq!(builder.graph().job_count(), 1);
    assert_eq!(calls(&counter), 1);
    let script = fs.read_to_string(Path::new("/work/jobs/a/___run.sh"))?;
    assert!(script.contains("-m pkg.first"));
    assert!(!script.contains("pkg.second"));
    Ok(())
}

#[test]
fn failed_service_start_leaves_nothing_behind() -> TestResult {
    init_tracing();
    let (mut builder, fs) =
        mock_builder_with(WorkflowConfigBuilder::new(Path::new(ROOT)).partition("short", 120));
    let container = builder.add_container("mongo", "docker", "mongo")?;

    let too_long = SlurmResourceRequest::new()
        .with_partition("short")
        .with_job_time_in_minutes(200);
    let start =
        builder.start_container_service(&container, Dep::none(), &[], "", Some(too_long.into()));

    assert!(matches!(start, Err(PlandagError::WalltimeExceeded { .. })));
    assert!(fs.files().is_empty(), "unexpected files: {:?}", fs.files());
    assert_eq!(builder.graph().job_count(), 0);
    match builder.stop_container_service(&container, Dep::none(), None) {
        Err(PlandagError::StaleServiceReference(name)) => assert_eq!(name, "mongo"),
        other => panic!("Expected StaleServiceReference, got {:?}", other),
    }
    Ok(())
}

#[test]
fn restarting_a_service_needs_the_same_arguments() -> TestResult {
    init_tracing();
    let (mut builder, fs) = mock_builder();
    let container = builder.add_container("mongo", "docker", "mongo")?;

    let first = builder.start_container_service(&container, Dep::none(), &[], "-p 1:1", None)?;
    let again = builder.start_container_service(&container, Dep::none(), &[], "-p 1:1", None)?;
    assert_eq!(first, again);

    let changed = builder.start_container_service(&container, Dep::none(), &[], "-p 2:2", None);
    assert!(matches!(changed, Err(PlandagError::DuplicateLocator { .. })));
    let start_script = fs.read_to_string(Path::new("/work/containers/mongo/start.sh"))?;
    assert!(start_script.contains("-p 1:1"));
    assert_eq!(builder.graph().job_count(), 1);
    Ok(())
}

#[test]
fn registered_container_settings_reach_the_catalog() -> TestResult {
    init_tracing();
    let (mut builder, fs) = mock_builder();

    builder.register_container(
        Container::new("tools", "singularity", "/images/tools.sif")?
            .with_arguments("--nv")
            .with_mounts(["/nas:/nas"])
            .with_image_site("local"),
    );
    let finalized = builder.finalize(None, &mut NeverPurge)?;

    let catalog = fs.read_to_string(&finalized.written.transformations)?;
    assert!(catalog.contains("\"/nas:/nas\""), "catalog was {catalog}");
    assert!(catalog.contains("\"--nv\""));
    assert!(catalog.contains("singularity"));
    Ok(())
}

#[test]
fn injected_partitions_and_container_writer_are_used() -> TestResult {
    init_tracing();
    let (builder, _fs) = mock_builder();
    let writer = CountingScriptWriter::new(DockerScriptWriter::new());
    let counter = writer.counter();
    let mut builder = builder
        .with_partitions(PartitionTable::new().with_partition("gpu", 60))
        .with_container_script_writer(writer);
    let run = ContainerRun::new("tools:1.0", "--rm", "nvidia-smi");

    // The configured default partition is not in the injected table.
    assert!(matches!(
        builder.run_container(&loc("jobs/smi"), &run, Dep::none(), JobOptions::new()),
        Err(PlandagError::MissingPartition(_))
    ));

    let on_gpu = SlurmResourceRequest::new()
        .with_partition("gpu")
        .with_job_time_in_minutes(30);
    builder.run_container(
        &loc("jobs/gpu"),
        &run,
        Dep::none(),
        JobOptions::new().resource_request(on_gpu),
    )?;
    assert_eq!(calls(&counter), 1);
    assert_eq!(builder.graph().job_count(), 1);
    Ok(())
}
