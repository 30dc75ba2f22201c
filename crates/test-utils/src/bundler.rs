use std::path::{Path, PathBuf};

use watchbuild::build::{BuildEngine, BuildFuture, BuildResult};
use watchbuild::errors::Result;
use watchbuild::types::ChangeSet;

/// A toy bundler: concatenates the given module files, in order, into one
/// output file.
///
/// Every build re-reads all modules, so the output always reflects the files
/// as they are when the build runs. A missing module becomes a build error
/// rather than an engine failure.
#[derive(Debug, Clone)]
pub struct ConcatBundleEngine {
    modules: Vec<PathBuf>,
    output: PathBuf,
}

impl ConcatBundleEngine {
    pub fn new(modules: Vec<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            modules,
            output: output.into(),
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    async fn bundle(self) -> Result<BuildResult> {
        let mut bundle = String::new();
        let mut result = BuildResult::success();

        for module in &self.modules {
            match tokio::fs::read_to_string(module).await {
                Ok(source) => {
                    bundle.push_str(&format!("// {}\n", module.display()));
                    bundle.push_str(&source);
                    bundle.push('\n');
                }
                Err(err) => result
                    .errors
                    .push(format!("cannot read module {}: {err}", module.display())),
            }
        }

        if let Some(parent) = self.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.output, bundle).await?;

        Ok(result.with_artifact(self.output))
    }
}

impl BuildEngine for ConcatBundleEngine {
    fn run(&mut self, _changes: &ChangeSet) -> BuildFuture {
        Box::pin(self.clone().bundle())
    }
}
