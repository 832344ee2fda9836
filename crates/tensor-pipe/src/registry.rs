use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::{Filter, FilterError};

/// Builds a fresh filter instance on demand.
pub type FilterFactory = Box<dyn Fn() -> Box<dyn Filter> + Send>;

/// The name → factory map a host uses to discover filters.
///
/// Plugins register themselves at load time; the host instantiates them by
/// name when the pipeline description asks for them.
#[derive(Default)]
pub struct FilterRegistry {
    factories: Mutex<HashMap<String, FilterFactory>>,
}

static GLOBAL: Lazy<FilterRegistry> = Lazy::new(FilterRegistry::default);

/// The process-wide registry.
pub fn registry() -> &'static FilterRegistry {
    &GLOBAL
}

impl FilterRegistry {
    /// Register a filter factory under `name`. Registering a name twice
    /// replaces the previous factory.
    pub fn register(&self, name: &str, factory: FilterFactory) {
        let mut factories = self.factories.lock().unwrap();
        if factories.insert(name.to_owned(), factory).is_some() {
            log::warn!("filter {name:?} was already registered; replacing it");
        } else {
            log::info!("registered filter {name:?}");
        }
    }

    /// Instantiate the filter registered under `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn Filter>, FilterError> {
        let factories = self.factories.lock().unwrap();
        factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| FilterError::UnknownFilter {
                name: name.to_owned(),
            })
    }

    /// The names of all registered filters, sorted.
    pub fn names(&self) -> Vec<String> {
        let factories = self.factories.lock().unwrap();
        let mut names: Vec<String> = factories.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TensorData, TensorsInfo};

    struct NoopFilter;
    impl Filter for NoopFilter {
        fn input_info(&self) -> TensorsInfo {
            TensorsInfo::default()
        }
        fn output_info(&self) -> TensorsInfo {
            TensorsInfo::default()
        }
        fn invoke(
            &mut self,
            _input: &[TensorData],
            _output: &mut [TensorData],
        ) -> Result<(), FilterError> {
            Ok(())
        }
    }

    #[test]
    fn register_and_create() {
        let registry = FilterRegistry::default();
        registry.register("noop", Box::new(|| Box::new(NoopFilter)));

        assert_eq!(registry.names(), vec!["noop".to_owned()]);
        let mut filter = registry.create("noop").unwrap();
        assert!(filter.invoke(&[], &mut []).is_ok());
    }

    #[test]
    fn unknown_name_is_an_error() {
        let registry = FilterRegistry::default();
        assert!(matches!(
            registry.create("missing"),
            Err(FilterError::UnknownFilter { .. })
        ));
    }

    #[test]
    fn re_registration_replaces() {
        let registry = FilterRegistry::default();
        registry.register("noop", Box::new(|| Box::new(NoopFilter)));
        registry.register("noop", Box::new(|| Box::new(NoopFilter)));
        assert_eq!(registry.names().len(), 1);
    }
}
