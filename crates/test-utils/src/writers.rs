use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use plandag::errors::Result;
use plandag::fs::FileSystem;
use plandag::scripts::{JobScriptWriter, ScriptRequest};

/// Wraps a script writer and counts how often it is invoked.
pub struct CountingScriptWriter<W> {
    inner: W,
    calls: Arc<AtomicUsize>,
}

impl<W: JobScriptWriter> CountingScriptWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter; stays valid after the writer moves into a builder.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl<W: JobScriptWriter> JobScriptWriter for CountingScriptWriter<W> {
    fn write_script(&self, fs: &dyn FileSystem, request: &ScriptRequest) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.write_script(fs, request)
    }
}

pub fn calls(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}
