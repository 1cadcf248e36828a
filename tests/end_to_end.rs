mod common;

use std::error::Error;
use std::fs;

use tempfile::tempdir;

use crate::common::{RecordingPolicy, WorkflowConfigBuilder, init_tracing, loc};
use plandag::artifact::Dep;
use plandag::checkpoint::{AlwaysPurge, NeverPurge, NoopCheck};
use plandag::demo::{DEMO_CATEGORY, schedule_demo};
use plandag::parameters::Parameters;
use plandag::signature::Program;
use plandag::workflow::{JobOptions, WorkflowBuilder};

type TestResult = Result<(), Box<dyn Error>>;

fn schedule_multiply_and_sort(builder: &mut WorkflowBuilder) -> TestResult {
    let root = builder.config().directory.clone();
    let multiply = builder.run_python_on_parameters(
        &loc("jobs/multiply"),
        &Program::module("pkg.multiply_by_x"),
        &Parameters::new()
            .with("input", vec![2, 4, 6])
            .with("factor", 3)
            .with("output_file", root.join("multiplied.txt")),
        Dep::none(),
        JobOptions::new(),
    )?;
    builder.run_python_on_parameters(
        &loc("jobs/sort"),
        &Program::module("pkg.sort_nums_in_file"),
        &Parameters::new()
            .with("input_file", root.join("multiplied.txt"))
            .with("output_file", root.join("sorted.txt")),
        &multiply,
        JobOptions::new(),
    )?;
    Ok(())
}

#[test]
fn multiply_then_sort_produces_a_two_job_plan() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let mut builder = WorkflowBuilder::from_config(WorkflowConfigBuilder::new(dir.path()).build());

    schedule_multiply_and_sort(&mut builder)?;
    assert_eq!(builder.graph().job_count(), 2);
    assert_eq!(builder.graph().edge_count(), 1);

    let finalized = builder.finalize(None, &mut NeverPurge)?;
    let plan = &finalized.plan;

    assert_eq!(plan.jobs.len(), 2);
    assert_eq!(plan.jobs[0].locator, "jobs/multiply");
    assert_eq!(plan.jobs[1].locator, "jobs/sort");
    assert_eq!(plan.edges.len(), 1);
    assert_eq!(plan.edges[0].parent, "jobs_multiply");
    assert_eq!(plan.edges[0].child, "jobs_sort");
    let via: Vec<&str> = plan.edges[0].via.iter().map(|f| f.name()).collect();
    assert_eq!(via, vec!["jobs/multiply/___ckpt"]);
    assert!(plan.category_limit_lines().is_empty());
    assert!(plan.replicas.is_empty());
    assert_eq!(
        finalized.noop_check,
        Some(NoopCheck {
            num_jobs: 2,
            num_checkpoints: 0
        })
    );

    for job in ["multiply", "sort"] {
        let script = dir.path().join("jobs").join(job).join("___run.sh");
        assert!(script.is_file(), "missing {}", script.display());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            assert_ne!(fs::metadata(&script)?.permissions().mode() & 0o111, 0);
        }
    }

    let properties = fs::read_to_string(&finalized.written.properties)?;
    assert!(!properties.contains("maxjobs"));
    let plan_text = fs::read_to_string(&finalized.written.plan)?;
    let parsed: toml::Value = toml::from_str(&plan_text)?;
    let jobs = parsed
        .get("jobs")
        .and_then(toml::Value::as_array)
        .ok_or("plan has no jobs array")?;
    assert_eq!(jobs.len(), 2);
    assert!(finalized.written.transformations.is_file());
    Ok(())
}

#[test]
fn rebuilding_a_finished_workflow_offers_a_purge() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    for job in ["multiply", "sort"] {
        let job_dir = dir.path().join("jobs").join(job);
        fs::create_dir_all(&job_dir)?;
        fs::write(job_dir.join("___ckpt"), "")?;
    }

    let mut builder = WorkflowBuilder::from_config(WorkflowConfigBuilder::new(dir.path()).build());
    schedule_multiply_and_sort(&mut builder)?;
    let mut policy = RecordingPolicy::answering(false);
    let kept = builder.finalize(None, &mut policy)?;

    assert_eq!(policy.seen.len(), 1);
    assert!(!kept.purged);
    assert!(kept.plan.jobs.iter().all(|j| j.checkpointed));
    assert!(dir.path().join("jobs/multiply/___ckpt").exists());
    let replicas = fs::read_to_string(&kept.written.replicas)?;
    assert!(replicas.contains("jobs/sort/___ckpt"));

    let mut builder = WorkflowBuilder::from_config(WorkflowConfigBuilder::new(dir.path()).build());
    schedule_multiply_and_sort(&mut builder)?;
    let purged = builder.finalize(None, &mut AlwaysPurge)?;

    assert!(purged.purged);
    assert!(!dir.path().join("jobs/multiply/___ckpt").exists());
    assert!(!dir.path().join("jobs/sort/___ckpt").exists());
    assert!(purged.plan.replicas.is_empty());
    Ok(())
}

#[test]
fn demo_workflow_limits_its_add_category() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let mut builder = WorkflowBuilder::from_config(WorkflowConfigBuilder::new(dir.path()).build());

    let nodes = schedule_demo(&mut builder)?;
    assert_eq!(nodes.len(), 3);
    assert!(dir.path().join("numbers.txt").is_file());

    let out = dir.path().join("plan");
    let finalized = builder.finalize(Some(&out), &mut NeverPurge)?;

    assert_eq!(finalized.plan.jobs.len(), 3);
    assert_eq!(finalized.plan.edges.len(), 2);
    assert_eq!(
        finalized.plan.category_limit_lines(),
        vec![format!("dagman.{DEMO_CATEGORY}.maxjobs = 1")]
    );
    let add = finalized
        .plan
        .jobs
        .iter()
        .find(|j| j.locator == "jobs/add")
        .ok_or("add job missing")?;
    assert_eq!(add.profile.category(), Some(DEMO_CATEGORY));
    assert_eq!(finalized.plan.replicas.len(), 1);
    assert_eq!(finalized.plan.replicas[0].lfn, "numbers.txt");

    let properties = fs::read_to_string(out.join("plandag.properties"))?;
    assert!(properties.contains("dagman.add.maxjobs = 1"));
    Ok(())
}
