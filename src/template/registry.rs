//! Function Registry
//!
//! The fixed table of callables available to tweak templates. A fresh
//! template environment is built from this table for every render.

use std::sync::Arc;

use minijinja::value::{Rest, Value};
use minijinja::{Environment, Error};

use super::folders::CycleStore;
use super::functions;
use crate::environment::Settings;
use crate::random::RandomSource;

/// How a callable is exposed to templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Called as `name(args)`
    Global,
    /// Applied as `value | name(args)`
    Filter,
}

/// State shared by every call a renderer makes.
pub struct FunctionContext {
    pub settings: Settings,
    pub random: Arc<dyn RandomSource>,
    pub cycles: CycleStore,
}

/// Native signature shared by all registered callables.
///
/// For filters the first argument is the piped value. Keyword arguments
/// arrive as a trailing kwargs value.
pub type NativeFunction = fn(&FunctionContext, &[Value]) -> Result<Value, Error>;

/// One entry of the function table.
#[derive(Clone, Copy)]
pub struct Registration {
    pub name: &'static str,
    pub kind: FunctionKind,
    pub function: NativeFunction,
}

const fn global(name: &'static str, function: NativeFunction) -> Registration {
    Registration {
        name,
        kind: FunctionKind::Global,
        function,
    }
}

const fn filter(name: &'static str, function: NativeFunction) -> Registration {
    Registration {
        name,
        kind: FunctionKind::Filter,
        function,
    }
}

/// Every callable available to templates.
pub const FUNCTIONS: &[Registration] = &[
    filter("match", functions::match_filter),
    filter("regex_match", functions::regex_match_filter),
    global("in_folder", functions::in_folder),
    global("in_folder_absolute", functions::in_folder_absolute),
    global("in_models_folder", functions::in_models_folder),
    global("from_folder", functions::from_folder),
    global("from_folder_absolute", functions::from_folder_absolute),
    global("from_models_folder", functions::from_models_folder),
    global("from_file", functions::from_file),
    global("from_file_in_folder", functions::from_file_in_folder),
    global("random_int", functions::random_int),
    global("random_float", functions::random_float),
    global("random_choice", functions::random_choice),
    global("random_seed", functions::random_seed),
    filter("wildcards", functions::wildcards),
    filter("as_image", functions::as_image),
    filter("as_json_property", functions::as_json_property),
];

/// Installs every entry of [`FUNCTIONS`] into `env`.
pub fn install(env: &mut Environment<'static>, context: &Arc<FunctionContext>) {
    for registration in FUNCTIONS {
        let function = registration.function;
        let context = Arc::clone(context);
        let callable = move |args: Rest<Value>| function(&context, &args.0);

        match registration.kind {
            FunctionKind::Global => env.add_function(registration.name, callable),
            FunctionKind::Filter => env.add_filter(registration.name, callable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<&str> = FUNCTIONS.iter().map(|r| r.name).collect();
        assert_eq!(names.len(), FUNCTIONS.len());
    }

    #[test]
    fn test_filters() {
        let filters: Vec<&str> = FUNCTIONS
            .iter()
            .filter(|r| r.kind == FunctionKind::Filter)
            .map(|r| r.name)
            .collect();
        assert_eq!(
            filters,
            vec!["match", "regex_match", "wildcards", "as_image", "as_json_property"]
        );
    }

    #[test]
    fn test_install_registers_callables() {
        let context = Arc::new(FunctionContext {
            settings: Settings::default(),
            random: Arc::new(crate::random::StdRandom::seeded(1)),
            cycles: CycleStore::new(),
        });
        let mut env = Environment::new();
        install(&mut env, &context);

        let rendered = env
            .render_str("{{ ['Alpha', 'beta'] | match('ALP') | join(',') }}", ())
            .unwrap();
        assert_eq!(rendered, "Alpha");
    }
}
