//! Variable loaders
//!
//! A loader builds a new variable from outside data (a file, a generator,
//! user input). Loaders only build; the workspace names, materializes and
//! registers the result.

use crate::error::Result;
use crate::host::Controller;
use crate::variable::Variable;
use std::path::Path;

pub trait VariableLoader {
    /// Loader name, recorded in the provenance of loaded variables.
    fn name(&self) -> &str;

    /// Suggested name for the next loaded variable.
    fn default_variable_name(&self) -> Option<String> {
        None
    }

    /// Clear any per-load state. Called after each successful load.
    fn reset(&mut self) {}

    /// Build the variable with an output port selected.
    fn load(&mut self, controller: &mut Controller<'_>) -> Result<Variable>;
}

/// A loader reading variables from files.
pub trait FileVariableLoader: VariableLoader {
    fn can_load(&self, path: &Path) -> bool;

    /// Point the loader at a file before `load`.
    fn select_file(&mut self, path: &Path) -> Result<()>;
}

/// Loaders that accept `path`, in order.
pub fn loaders_for_file<'a>(
    loaders: &'a mut [Box<dyn FileVariableLoader>],
    path: &'a Path,
) -> impl Iterator<Item = &'a mut Box<dyn FileVariableLoader>> + 'a {
    loaders.iter_mut().filter(move |loader| loader.can_load(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatError;

    struct Extension {
        extension: &'static str,
    }

    impl VariableLoader for Extension {
        fn name(&self) -> &str {
            self.extension
        }

        fn load(&mut self, _controller: &mut Controller<'_>) -> Result<Variable> {
            Err(DatError::Host("not used".into()))
        }
    }

    impl FileVariableLoader for Extension {
        fn can_load(&self, path: &Path) -> bool {
            path.extension().is_some_and(|e| e == self.extension)
        }

        fn select_file(&mut self, path: &Path) -> Result<()> {
            if self.can_load(path) {
                Ok(())
            } else {
                Err(DatError::Host(format!("cannot load {:?}", path)))
            }
        }
    }

    #[test]
    fn test_loaders_for_file_filters_by_can_load() {
        let mut loaders: Vec<Box<dyn FileVariableLoader>> = vec![
            Box::new(Extension { extension: "csv" }),
            Box::new(Extension { extension: "nc" }),
        ];
        let path = Path::new("/data/run.nc");
        let mut names = Vec::new();
        for loader in loaders_for_file(&mut loaders, path) {
            loader.select_file(path).unwrap();
            names.push(loader.name().to_string());
        }
        assert_eq!(names, vec!["nc".to_string()]);
        assert!(loaders[0].select_file(path).is_err());
        assert!(loaders[0].default_variable_name().is_none());
    }
}
