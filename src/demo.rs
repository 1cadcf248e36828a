// src/demo.rs

//! A three-job demo: multiply a list of numbers, sort the result, add a
//! constant to each. The programs themselves are not part of this crate;
//! only their scheduling is.

use crate::artifact::{Dep, DependencyNode};
use crate::errors::Result;
use crate::locator::Locator;
use crate::parameters::Parameters;
use crate::signature::Program;
use crate::workflow::{JobOptions, WorkflowBuilder};

pub const DEMO_CATEGORY: &str = "add";

/// Schedule the demo jobs into `builder`; returns multiply, sort, add.
pub fn schedule_demo(builder: &mut WorkflowBuilder) -> Result<Vec<DependencyNode>> {
    let root = builder.config().directory.clone();
    let input = root.join("numbers.txt");
    let numbers: Vec<String> = (0..25u32).map(|i| ((i * 37 + 11) % 100).to_string()).collect();
    builder
        .file_system()
        .write(&input, format!("{}\n", numbers.join("\n")).as_bytes())?;
    builder.create_file("numbers.txt", &input, true);

    let jobs: Locator = "jobs".parse()?;
    let multiplied = root.join("multiplied.txt");
    let sorted = root.join("sorted.txt");
    let summed = root.join("added.txt");

    let multiply = builder.run_python_on_parameters(
        &jobs.join("multiply")?,
        &Program::module("plandag_demo.multiply_by_x"),
        &Parameters::new()
            .with("input_file", input)
            .with("output_file", multiplied.clone())
            .with("x", 4),
        Dep::none(),
        JobOptions::new(),
    )?;

    let sort = builder.run_python_on_parameters(
        &jobs.join("sort")?,
        &Program::module("plandag_demo.sort_nums_in_file"),
        &Parameters::new()
            .with("input_file", multiplied)
            .with("output_file", sorted.clone()),
        &multiply,
        JobOptions::new(),
    )?;

    let add = builder.run_python_on_args(
        &jobs.join("add")?,
        &Program::module("plandag_demo.add_y"),
        &format!("{} {} 10", sorted.display(), summed.display()),
        &sort,
        JobOptions::new().category(DEMO_CATEGORY),
    )?;
    builder.limit_jobs_for_category(DEMO_CATEGORY, 1);

    Ok(vec![multiply, sort, add])
}
