// src/key_value.rs

//! Zip-backed key-value stores flowing between jobs.
//!
//! A store is a [`ValueArtifact`] whose value says where the zip lives. The
//! helpers here schedule the usual split/join/downsample jobs on a
//! [`WorkflowBuilder`] and hand back stores that depend on them, so stores
//! can be passed straight into `depends_on`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::artifact::{Artifact, Dep, ValueArtifact};
use crate::errors::{PlandagError, Result};
use crate::locator::Locator;
use crate::parameters::Parameters;
use crate::signature::Program;
use crate::workflow::{JobOptions, WorkflowBuilder};

pub const SPLIT_ENTRY_POINT: &str = "vistautils.scripts.split_key_value_store";
pub const JOIN_ENTRY_POINT: &str = "vistautils.scripts.join_key_value_stores";
pub const DOWNSAMPLE_ENTRY_POINT: &str = "vistautils.scripts.downsample_key_value_store";

/// Location of a zip file mapping keys to values. It may hold no entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipKeyValueStore {
    path: PathBuf,
}

impl ZipKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parameters telling an entry point to read this store.
    pub fn input_parameters(&self) -> Parameters {
        Parameters::new()
            .with("type", "zip")
            .with("path", self.path.as_path())
    }

    /// Parameters telling an entry point to write this store.
    pub fn output_parameters(&self) -> Parameters {
        self.input_parameters()
    }
}

pub type KeyValueStore = ValueArtifact<ZipKeyValueStore>;

/// A pre-existing store, e.g. a corpus on shared storage.
pub fn existing_store(path: impl Into<PathBuf>, locator: Locator) -> KeyValueStore {
    ValueArtifact::preexisting(ZipKeyValueStore::new(path), Some(locator))
}

/// Schedules the jobs turning one store into another.
///
/// `output_locator` is where the result should live; a transform picks its
/// own locator (derived from the input's) when it is `None`.
pub trait KeyValueTransform {
    fn apply(
        &self,
        builder: &mut WorkflowBuilder,
        input: &KeyValueStore,
        output_locator: Option<&Locator>,
    ) -> Result<KeyValueStore>;
}

impl<F> KeyValueTransform for F
where
    F: Fn(&mut WorkflowBuilder, &KeyValueStore, Option<&Locator>) -> Result<KeyValueStore>,
{
    fn apply(
        &self,
        builder: &mut WorkflowBuilder,
        input: &KeyValueStore,
        output_locator: Option<&Locator>,
    ) -> Result<KeyValueStore> {
        self(builder, input, output_locator)
    }
}

/// Transforms applied in order. Only the last one receives the caller's
/// output locator.
pub struct ComposedTransform {
    transforms: Vec<Box<dyn KeyValueTransform>>,
}

impl ComposedTransform {
    pub fn new(transforms: Vec<Box<dyn KeyValueTransform>>) -> Result<Self> {
        if transforms.is_empty() {
            return Err(PlandagError::InvalidKeyValueOperation(
                "cannot compose zero transforms".to_string(),
            ));
        }
        Ok(Self { transforms })
    }
}

impl KeyValueTransform for ComposedTransform {
    fn apply(
        &self,
        builder: &mut WorkflowBuilder,
        input: &KeyValueStore,
        output_locator: Option<&Locator>,
    ) -> Result<KeyValueStore> {
        let last = self.transforms.len() - 1;
        let mut current = input.clone();
        for (i, transform) in self.transforms.iter().enumerate() {
            let step_locator = if i == last { output_locator } else { None };
            current = transform.apply(builder, &current, step_locator)?;
        }
        Ok(current)
    }
}

/// [`downsample`] as a transform.
#[derive(Debug, Clone, Copy)]
pub struct Downsample {
    pub limit: u32,
}

impl KeyValueTransform for Downsample {
    fn apply(
        &self,
        builder: &mut WorkflowBuilder,
        input: &KeyValueStore,
        output_locator: Option<&Locator>,
    ) -> Result<KeyValueStore> {
        downsample(builder, input, self.limit, output_locator)
    }
}

fn store_locator(store: &KeyValueStore) -> Result<&Locator> {
    store.locator().ok_or_else(|| {
        PlandagError::InvalidKeyValueOperation(format!(
            "store at {} has no locator to derive job locators from",
            store.value().path().display()
        ))
    })
}

/// Split `input` into `num_parts` zips of nearly equal size, some possibly
/// empty. Part `i` is `<input>/split/i.zip` at locator `<input>/split/<i>`.
pub fn split_key_value_store(
    builder: &mut WorkflowBuilder,
    input: &KeyValueStore,
    num_parts: u32,
    random_seed: Option<i64>,
) -> Result<Vec<KeyValueStore>> {
    if num_parts == 0 {
        return Err(PlandagError::InvalidKeyValueOperation(
            "number of parts must be positive".to_string(),
        ));
    }
    let split_locator = store_locator(input)?.join("split")?;
    let output_dir = builder.directory_for(&split_locator)?;

    let mut params = Parameters::new()
        .with("input", input.value().input_parameters())
        .with("num_slices", num_parts)
        .with("output_dir", output_dir.as_path());
    if let Some(seed) = random_seed {
        params.insert("random_seed", seed);
    }
    let node = builder.run_python_on_parameters(
        &split_locator,
        &Program::module(SPLIT_ENTRY_POINT),
        &params,
        input,
        JobOptions::new(),
    )?;
    debug!(store = %split_locator, parts = num_parts, "split key-value store");

    let mut parts = Vec::with_capacity(num_parts as usize);
    for i in 0..num_parts {
        parts.push(ValueArtifact::computed(
            ZipKeyValueStore::new(output_dir.join(format!("{i}.zip"))),
            node.clone(),
            Some(split_locator.join(&i.to_string())?),
        ));
    }
    Ok(parts)
}

/// Join `stores` into `<output_locator>/joined.zip`.
pub fn join_to_key_value_zip(
    builder: &mut WorkflowBuilder,
    stores: &[KeyValueStore],
    output_locator: &Locator,
) -> Result<KeyValueStore> {
    let output = ZipKeyValueStore::new(builder.directory_for(output_locator)?.join("joined.zip"));
    let inputs: Vec<PathBuf> = stores.iter().map(|s| s.value().path().to_path_buf()).collect();

    let params = Parameters::new()
        .with("input_store_list_file", inputs)
        .with("output", output.output_parameters());
    let depends_on: Vec<Dep> = stores.iter().map(Dep::from).collect();
    let node = builder.run_python_on_parameters(
        output_locator,
        &Program::module(JOIN_ENTRY_POINT),
        &params,
        depends_on,
        JobOptions::new(),
    )?;

    Ok(ValueArtifact::computed(output, node, Some(output_locator.clone())))
}

/// Apply `transform` to `input`, fanning out over `parallelism` splits when
/// it is above one and joining the results at `output_locator`.
pub fn transform_key_value_store(
    builder: &mut WorkflowBuilder,
    input: &KeyValueStore,
    transform: &dyn KeyValueTransform,
    output_locator: &Locator,
    parallelism: u32,
) -> Result<KeyValueStore> {
    match parallelism {
        0 => Err(PlandagError::InvalidKeyValueOperation(
            "parallelism must be positive".to_string(),
        )),
        1 => transform.apply(builder, input, Some(output_locator)),
        _ => {
            let transformed = split_key_value_store(builder, input, parallelism, None)?
                .iter()
                .map(|part| transform.apply(builder, part, None))
                .collect::<Result<Vec<_>>>()?;
            join_to_key_value_zip(builder, &transformed, output_locator)
        }
    }
}

/// Keep at most `limit` entries of `input`. Defaults to the locator
/// `<input>/downsampled-<limit>`.
pub fn downsample(
    builder: &mut WorkflowBuilder,
    input: &KeyValueStore,
    limit: u32,
    output_locator: Option<&Locator>,
) -> Result<KeyValueStore> {
    let locator = match output_locator {
        Some(locator) => locator.clone(),
        None => store_locator(input)?.join(&format!("downsampled-{limit}"))?,
    };
    let output = ZipKeyValueStore::new(builder.directory_for(&locator)?.join("downsampled.zip"));

    let params = Parameters::new()
        .with("input", input.value().input_parameters())
        .with("output_zip_path", output.path())
        .with("num_to_sample", limit)
        .with("random_seed", 0);
    let node = builder.run_python_on_parameters(
        &locator,
        &Program::module(DOWNSAMPLE_ENTRY_POINT),
        &params,
        input,
        JobOptions::new(),
    )?;

    let artifact = Artifact::new(vec![Dep::from(input), Dep::from(node)], Some(locator))?;
    Ok(ValueArtifact::new(output, artifact))
}

/// Files listing the keys of each part of an explicit split.
#[derive(Debug, Clone)]
pub struct SplitKeys {
    pub train: ValueArtifact<PathBuf>,
    pub dev: ValueArtifact<PathBuf>,
    pub test: ValueArtifact<PathBuf>,
}

/// A train/dev/test split. A missing part is an empty store.
#[derive(Debug, Clone)]
pub struct DataSplit {
    pub train: KeyValueStore,
    pub dev: KeyValueStore,
    pub test: KeyValueStore,
}

/// Split `corpus` by the key lists in `keys`, writing
/// `<output_locator>/{train,dev,test}/<part>.zip`.
///
/// With `exhaustive` the split job fails on a key assigned to no part.
/// `downsample_to` shrinks each part afterwards.
pub fn explicit_train_dev_test_split(
    builder: &mut WorkflowBuilder,
    corpus: &KeyValueStore,
    keys: &SplitKeys,
    output_locator: &Locator,
    exhaustive: bool,
    downsample_to: Option<u32>,
) -> Result<DataSplit> {
    let parts = [("train", &keys.train), ("dev", &keys.dev), ("test", &keys.test)];

    let mut explicit_split = Parameters::new();
    let mut outputs = Vec::with_capacity(parts.len());
    for (name, ids) in parts {
        let locator = output_locator.join(name)?;
        let zip = builder.directory_for(&locator)?.join(format!("{name}.zip"));
        explicit_split.insert(
            name,
            Parameters::new()
                .with("keys_file", ids.value().as_path())
                .with("output_file", zip.as_path()),
        );
        outputs.push((locator, zip));
    }

    let params = Parameters::new()
        .with("input", corpus.value().input_parameters())
        .with("explicit_split", explicit_split)
        .with("must_be_exhaustive", exhaustive);
    let depends_on = vec![
        Dep::from(corpus),
        Dep::from(&keys.train),
        Dep::from(&keys.dev),
        Dep::from(&keys.test),
    ];
    let node = builder.run_python_on_parameters(
        output_locator,
        &Program::module(SPLIT_ENTRY_POINT),
        &params,
        depends_on,
        JobOptions::new(),
    )?;

    let mut stores = Vec::with_capacity(outputs.len());
    for (locator, zip) in outputs {
        let store = ValueArtifact::new(
            ZipKeyValueStore::new(zip),
            Artifact::computed(node.clone(), Some(locator)),
        );
        stores.push(match downsample_to {
            Some(limit) => downsample(builder, &store, limit, None)?,
            None => store,
        });
    }

    let [train, dev, test]: [KeyValueStore; 3] = stores.try_into().map_err(|_| {
        PlandagError::InvalidKeyValueOperation("split must produce three parts".to_string())
    })?;
    Ok(DataSplit { train, dev, test })
}
