mod common;

use std::error::Error;
use std::path::{Path, PathBuf};

use crate::common::{init_tracing, loc, mock_builder};
use plandag::artifact::Dep;
use plandag::container::{Container, ContainerRemap, PARAMS_FILE_NAME};
use plandag::errors::PlandagError;
use plandag::fs::FileSystem;
use plandag::parameters::{ParamValue, Parameters};
use plandag::signature::Program;
use plandag::types::ContainerType;
use plandag::workflow::JobOptions;

type TestResult = Result<(), Box<dyn Error>>;

fn plan(inputs: &[&str], outputs: &[&str]) -> plandag::errors::Result<ContainerRemap> {
    let inputs: Vec<PathBuf> = inputs.iter().map(PathBuf::from).collect();
    let outputs: Vec<PathBuf> = outputs.iter().map(PathBuf::from).collect();
    ContainerRemap::plan(
        &loc("jobs/c"),
        Path::new("/scratch/Test/jobs/c"),
        Path::new("/data"),
        &inputs,
        &outputs,
    )
}

#[test]
fn same_basename_in_two_directories_collides() {
    init_tracing();

    match plan(&["/a/x.txt", "/b/x.txt"], &[]) {
        Err(PlandagError::DuplicateContainerFileName { job, name }) => {
            assert_eq!(job, "jobs/c");
            assert_eq!(name, "x.txt");
        }
        other => panic!("Expected DuplicateContainerFileName, got {:?}", other),
    }
}

#[test]
fn repeated_path_and_input_output_overlap_collide() {
    init_tracing();

    assert!(matches!(
        plan(&["/a/x.txt", "/a/x.txt"], &[]),
        Err(PlandagError::DuplicateContainerFileName { .. })
    ));
    assert!(matches!(
        plan(&["/a/x.txt"], &["/out/x.txt"]),
        Err(PlandagError::DuplicateContainerFileName { .. })
    ));
    assert!(matches!(
        plan(&[format!("/a/{PARAMS_FILE_NAME}").as_str()], &[]),
        Err(PlandagError::DuplicateContainerFileName { .. })
    ));
}

#[test]
fn mappings_use_staging_and_mount_roots() -> TestResult {
    init_tracing();

    let remap = plan(&["/nas/in.txt"], &["/nas/out.txt"])?;
    let input = &remap.inputs()[0];
    assert_eq!(input.name, "in.txt");
    assert_eq!(input.host, Path::new("/nas/in.txt"));
    assert_eq!(input.staging, Path::new("/scratch/Test/jobs/c/in.txt"));
    assert_eq!(input.in_container, Path::new("/data/in.txt"));
    assert_eq!(
        remap.in_container_path(Path::new("/nas/out.txt")),
        Some(Path::new("/data/out.txt"))
    );
    assert_eq!(remap.in_container_path(Path::new("/nas/other.txt")), None);
    Ok(())
}

#[test]
fn parameters_and_args_are_rewritten() -> TestResult {
    init_tracing();

    let remap = plan(&["/nas/in.txt"], &["/nas/out.txt"])?;
    let params = Parameters::new()
        .with("input", Path::new("/nas/in.txt"))
        .with("output", "/nas/out.txt")
        .with("both", vec![PathBuf::from("/nas/in.txt"), PathBuf::from("/elsewhere.txt")])
        .with("n", 3)
        .with(
            "store",
            Parameters::new()
                .with("type", "zip")
                .with("path", Path::new("/nas/in.txt")),
        );

    let rewritten = remap.rewrite_parameters(&params);
    assert_eq!(rewritten.get("input"), Some(&ParamValue::from("/data/in.txt")));
    assert_eq!(rewritten.get("output"), Some(&ParamValue::from("/data/out.txt")));
    assert_eq!(
        rewritten.get("both"),
        Some(&ParamValue::List(vec![
            ParamValue::from("/data/in.txt"),
            ParamValue::from(PathBuf::from("/elsewhere.txt")),
        ]))
    );
    assert_eq!(rewritten.get("n"), Some(&ParamValue::from(3)));
    assert_eq!(
        rewritten.get("store"),
        Some(&ParamValue::from(
            Parameters::new()
                .with("type", "zip")
                .with("path", "/data/in.txt")
        ))
    );

    assert_eq!(
        remap.rewrite_args("--in /nas/in.txt  --out /nas/out.txt --keep /tmp/x"),
        "--in /data/in.txt --out /data/out.txt --keep /tmp/x"
    );
    Ok(())
}

#[test]
fn copy_commands_wrap_the_user_commands() -> TestResult {
    init_tracing();

    let remap = plan(&["/nas/in.txt"], &["/nas/out.txt"])?;
    let params = remap.params_file(Path::new("/work/jobs/c/____params.params"));

    assert_eq!(
        remap.pre_job_commands(Some(&params), &["echo pre".to_string()]),
        vec![
            "mkdir -p /scratch/Test/jobs/c",
            "cp /work/jobs/c/____params.params /scratch/Test/jobs/c/____params.params",
            "cp /nas/in.txt /scratch/Test/jobs/c/in.txt",
            "echo pre",
        ]
    );
    assert_eq!(
        remap.post_job_commands(&["echo post".to_string()]),
        vec!["cp /scratch/Test/jobs/c/out.txt /nas/out.txt", "echo post"]
    );
    assert_eq!(remap.docker_args(""), "--rm -v /scratch/Test/jobs/c:/data");
    assert_eq!(
        remap.docker_args("--network host"),
        "--rm -v /scratch/Test/jobs/c:/data --network host"
    );
    Ok(())
}

#[test]
fn container_types_parse() -> TestResult {
    init_tracing();

    let container = Container::new("tools", "Singularity", "tools")?;
    assert_eq!(container.container_type, ContainerType::Singularity);
    assert_eq!(container.image_archive(), None);

    let archived = Container::new("tools:2", "docker", "/img/tools.tar")?;
    assert_eq!(archived.image_archive(), Some("/img/tools.tar"));

    assert!(matches!(
        Container::new("x", "lxc", "x"),
        Err(PlandagError::UnknownContainerType(_))
    ));
    assert!(matches!(Container::new(" ", "docker", "x"), Err(PlandagError::ConfigError(_))));
    Ok(())
}

#[test]
fn python_in_container_stages_parameters() -> TestResult {
    init_tracing();
    let (mut builder, fs) = mock_builder();
    let container = builder.add_container("tools:1.0", "docker", "/images/tools.tar")?;

    builder.run_python_on_parameters(
        &loc("jobs/c"),
        &Program::module("pkg.work"),
        &Parameters::new()
            .with("input", Path::new("/nas/in.txt"))
            .with("output", Path::new("/nas/out.txt")),
        Dep::none(),
        JobOptions::new()
            .in_container(&container)
            .input_file("/nas/in.txt")
            .output_file("/nas/out.txt"),
    )?;

    let params = fs.read_to_string(Path::new("/work/jobs/c/____params.params"))?;
    assert!(params.contains("input = \"/data/in.txt\""), "params were {params}");
    assert!(params.contains("output = \"/data/out.txt\""));

    let script = fs.read_to_string(Path::new("/work/jobs/c/___run.sh"))?;
    let expected_order = [
        "docker load --input /images/tools.tar",
        "mkdir -p /scratch/dockermount/Test/jobs/c",
        "cp /work/jobs/c/____params.params /scratch/dockermount/Test/jobs/c/____params.params",
        "cp /nas/in.txt /scratch/dockermount/Test/jobs/c/in.txt",
        "docker run --rm -v /scratch/dockermount/Test/jobs/c:/data tools:1.0 \
         /usr/local/bin/python -m pkg.work /data/____params.params",
        "cp /scratch/dockermount/Test/jobs/c/out.txt /nas/out.txt",
        "touch /work/jobs/c/___ckpt",
    ];
    let mut last = 0;
    for needle in expected_order {
        let at = script[last..]
            .find(needle)
            .unwrap_or_else(|| panic!("{needle:?} missing or out of order in:\n{script}"));
        last += at + needle.len();
    }
    Ok(())
}

#[test]
fn collision_fails_before_anything_is_written() -> TestResult {
    init_tracing();
    let (mut builder, fs) = mock_builder();
    let container = builder.add_container("tools", "docker", "tools")?;

    let result = builder.run_python_on_args(
        &loc("jobs/c"),
        &Program::module("pkg.work"),
        "/a/x.txt /b/x.txt",
        Dep::none(),
        JobOptions::new()
            .in_container(&container)
            .input_file("/a/x.txt")
            .input_file("/b/x.txt"),
    );

    assert!(matches!(result, Err(PlandagError::DuplicateContainerFileName { .. })));
    assert_eq!(builder.graph().job_count(), 0);
    assert!(fs.files().is_empty(), "unexpected files: {:?}", fs.files());
    Ok(())
}

#[test]
fn args_in_container_are_remapped() -> TestResult {
    init_tracing();
    let (mut builder, fs) = mock_builder();
    let container = builder.add_container("tools", "docker", "tools")?;

    builder.run_python_on_args(
        &loc("jobs/c"),
        &Program::module("pkg.work"),
        "--in /nas/in.txt",
        Dep::none(),
        JobOptions::new().in_container(&container).input_file("/nas/in.txt"),
    )?;

    let script = fs.read_to_string(Path::new("/work/jobs/c/___run.sh"))?;
    assert!(script.contains("tools /usr/local/bin/python -m pkg.work --in /data/in.txt 2>&1"));
    assert!(!script.contains("docker load"));
    assert!(!fs.exists(Path::new("/work/jobs/c/____params.params")));
    Ok(())
}
