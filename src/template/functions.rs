//! Template Functions
//!
//! Native implementations behind [`super::FUNCTIONS`]. Arguments are
//! decoded with [`from_args`]; failures become `invalid operation` errors.

use std::fs;
use std::path::Path;

use log::debug;
use minijinja::value::{from_args, Kwargs, Rest, Value};
use minijinja::{Error, ErrorKind};

use super::folders::{self, CycleKey, ListingKind, DEFAULT_FILE_GLOB, DEFAULT_TEXT_GLOB};
use super::image::import_image;
use super::registry::FunctionContext;
use super::FunctionError;
use crate::random::MAX_SEED;
use crate::wildcards::WildcardProcessor;

/// Arguments of the `from_*` folder functions.
#[derive(Debug)]
struct FolderQuery {
    folder: String,
    glob: String,
    match_pattern: Option<String>,
    regex_pattern: Option<String>,
    cycle: bool,
}

impl FolderQuery {
    fn parse(args: &[Value], default_glob: &str) -> Result<Self, Error> {
        let (positional, kwargs) = split_kwargs(args)?;
        let (folder, glob): (String, Option<String>) = from_args(positional)?;

        let query = Self {
            folder,
            glob: glob.unwrap_or_else(|| default_glob.to_string()),
            match_pattern: non_empty(kwargs.get::<Option<String>>("match")?),
            regex_pattern: non_empty(kwargs.get::<Option<String>>("regex_match")?),
            cycle: kwargs.get::<Option<bool>>("cycle")?.unwrap_or(false),
        };
        kwargs.assert_all_used()?;
        Ok(query)
    }

    fn key(&self, kind: ListingKind) -> CycleKey {
        CycleKey {
            kind,
            folder: self.folder.clone(),
            glob: self.glob.clone(),
            match_pattern: self.match_pattern.clone(),
            regex_pattern: self.regex_pattern.clone(),
        }
    }
}

fn non_empty(pattern: Option<String>) -> Option<String> {
    pattern.filter(|p| !p.is_empty())
}

/// Separates a trailing kwargs value from positional arguments.
fn split_kwargs(args: &[Value]) -> Result<(&[Value], Kwargs), Error> {
    let (positional, trailing) = match args.last() {
        Some(last) if last.is_kwargs() => args.split_at(args.len() - 1),
        _ => (args, &[][..]),
    };
    let (kwargs,): (Kwargs,) = from_args(trailing)?;
    Ok((positional, kwargs))
}

fn listing(
    ctx: &FunctionContext,
    kind: ListingKind,
    folder: &str,
    glob: &str,
) -> Result<Vec<String>, FunctionError> {
    let root = match kind {
        ListingKind::Relative | ListingKind::Absolute => Path::new(folder).to_path_buf(),
        ListingKind::Models => ctx
            .settings
            .models_folder
            .as_ref()
            .ok_or(FunctionError::NotConfigured("models folder"))?
            .join(folder),
    };

    let files = folders::list_folder(&root, glob)?;
    let listed = files
        .into_iter()
        .map(|relative| match kind {
            ListingKind::Absolute => root.join(relative).to_string_lossy().into_owned(),
            _ => relative.to_string_lossy().into_owned(),
        })
        .collect();
    Ok(listed)
}

/// Picks one entry of a filtered listing, at random or by cycling.
fn pick(ctx: &FunctionContext, kind: ListingKind, query: &FolderQuery) -> Result<String, FunctionError> {
    let filtered = || {
        let items = listing(ctx, kind, &query.folder, &query.glob)?;
        folders::filter_collection(
            items,
            query.match_pattern.as_deref(),
            query.regex_pattern.as_deref(),
        )
    };

    if query.cycle {
        return ctx.cycles.next(query.key(kind), filtered);
    }

    let items = filtered()?;
    if items.is_empty() {
        return Err(FunctionError::NoMatches {
            folder: query.folder.clone(),
            glob: query.glob.clone(),
        });
    }
    Ok(items[ctx.random.index(items.len())].clone())
}

fn read_text(path: &Path) -> Result<String, FunctionError> {
    fs::read_to_string(path).map_err(|e| FunctionError::io(path, e))
}

pub fn match_filter(_ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    let (items, pattern): (Vec<String>, String) = from_args(args)?;
    Ok(Value::from(folders::match_substring(items, &pattern)))
}

pub fn regex_match_filter(_ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    let (items, pattern): (Vec<String>, String) = from_args(args)?;
    Ok(Value::from(folders::match_regex(items, &pattern)?))
}

fn in_listing(ctx: &FunctionContext, kind: ListingKind, args: &[Value]) -> Result<Value, Error> {
    let (folder, glob): (String, Option<String>) = from_args(args)?;
    let glob = glob.unwrap_or_else(|| DEFAULT_FILE_GLOB.to_string());
    Ok(Value::from(listing(ctx, kind, &folder, &glob)?))
}

pub fn in_folder(ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    in_listing(ctx, ListingKind::Relative, args)
}

pub fn in_folder_absolute(ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    in_listing(ctx, ListingKind::Absolute, args)
}

pub fn in_models_folder(ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    in_listing(ctx, ListingKind::Models, args)
}

fn from_listing(ctx: &FunctionContext, kind: ListingKind, args: &[Value]) -> Result<Value, Error> {
    let query = FolderQuery::parse(args, DEFAULT_FILE_GLOB)?;
    Ok(Value::from(pick(ctx, kind, &query)?))
}

pub fn from_folder(ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    from_listing(ctx, ListingKind::Relative, args)
}

pub fn from_folder_absolute(ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    from_listing(ctx, ListingKind::Absolute, args)
}

pub fn from_models_folder(ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    from_listing(ctx, ListingKind::Models, args)
}

pub fn from_file(_ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    let (path,): (String,) = from_args(args)?;
    Ok(Value::from(read_text(Path::new(&path))?))
}

/// Text of a file picked like `from_folder_absolute` (shares its cursors).
pub fn from_file_in_folder(ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    let query = FolderQuery::parse(args, DEFAULT_TEXT_GLOB)?;
    let path = pick(ctx, ListingKind::Absolute, &query)?;
    Ok(Value::from(read_text(Path::new(&path))?))
}

pub fn random_int(ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    let (min, max): (i64, i64) = from_args(args)?;
    if min > max {
        return Err(FunctionError::InvalidRange {
            min: min.to_string(),
            max: max.to_string(),
        }
        .into());
    }
    Ok(Value::from(ctx.random.int_between(min, max)))
}

pub fn random_float(ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    let (min, max): (f64, f64) = from_args(args)?;
    // The span has to be finite as well as both ends
    if !(max - min).is_finite() || min > max {
        return Err(FunctionError::InvalidRange {
            min: min.to_string(),
            max: max.to_string(),
        }
        .into());
    }
    Ok(Value::from(ctx.random.float_between(min, max)))
}

pub fn random_choice(ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    let (choices,): (Vec<Value>,) = from_args(args)?;
    if choices.is_empty() {
        return Err(FunctionError::EmptyChoice.into());
    }
    Ok(choices[ctx.random.index(choices.len())].clone())
}

pub fn random_seed(ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    if !args.is_empty() {
        return Err(Error::new(
            ErrorKind::TooManyArguments,
            "random_seed() takes no arguments",
        ));
    }
    Ok(Value::from(ctx.random.int_between(0, MAX_SEED)))
}

/// Expands wildcards with the configured wildcards directory.
pub fn wildcards(ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    let (text,): (String,) = from_args(args)?;
    let processor = WildcardProcessor::new(
        ctx.settings.wildcards_directory.clone(),
        ctx.random.clone(),
    );
    let expanded = processor.process(&text).map_err(FunctionError::from)?;
    Ok(Value::from(expanded))
}

pub fn as_image(ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    let (path,): (String,) = from_args(args)?;
    let input_folder = ctx
        .settings
        .input_folder
        .as_ref()
        .ok_or(FunctionError::NotConfigured("input folder"))?;
    Ok(Value::from(import_image(input_folder, Path::new(&path))?))
}

/// Reads a JSON file and descends `keys`: strings index objects, integers
/// index arrays.
pub fn as_json_property(_ctx: &FunctionContext, args: &[Value]) -> Result<Value, Error> {
    let (path, keys): (String, Rest<Value>) = from_args(args)?;
    let path = Path::new(&path);

    let data: serde_json::Value = serde_json::from_str(&read_text(path)?).map_err(|e| {
        FunctionError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    let mut current = &data;
    for key in keys.iter() {
        let next = match key.as_str() {
            Some(name) => current.get(name),
            None => i64::try_from(key.clone())
                .ok()
                .and_then(|index| usize::try_from(index).ok())
                .and_then(|index| current.get(index)),
        };
        current = next.ok_or_else(|| FunctionError::MissingKey {
            path: path.to_path_buf(),
            key: key.to_string(),
        })?;
    }

    debug!("JSON property from {} resolved", path.display());
    Ok(Value::from_serialize(current))
}
