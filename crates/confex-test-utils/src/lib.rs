//! Various helper functions for testing
//!
//! functions in this module should use results and not use any panics to avoid confusion in callers

use std::cell::Cell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use confex::environment::memory::Toolbox;
use confex::{Check, MemoryEnvironment, ToolDefinition, Value};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("path is not valid unicode: {0}")]
	NonUnicodePath(std::path::PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Tools with known overlap behaviour.
///
/// - `T1` provides `CC` and `AS`, `AS` only as a default so it can't overlap.
/// - `T2` provides `CC`.
/// - `gcc`, `gas` and `gnulink` are plain tools, `mingw` is a toolchain loading all three.
pub fn toolbox() -> Toolbox {
	let mut toolbox = Toolbox::new();
	toolbox.insert("T1".into(), ToolDefinition::new().set("CC", "t1-cc").default_value("AS", "t1-as"));
	toolbox.insert("T2".into(), ToolDefinition::new().set("CC", "t2-cc"));
	toolbox.insert("gcc".into(), ToolDefinition::new().set("CC", "gcc").set("CCFLAGS", "-O2").set("OBJSUFFIX", ".o"));
	toolbox.insert("gas".into(), ToolDefinition::new().set("AS", "as").default_value("ASPP", "gcc"));
	toolbox.insert("gnulink".into(), ToolDefinition::new().set("LINK", "gcc").set("LINKFLAGS", ""));
	toolbox.insert("mingw".into(), ToolDefinition::new().loads(["gcc", "gas", "gnulink"]));
	toolbox
}

/// Builds a toolbox from name/definition pairs.
pub fn toolbox_from(definitions: impl IntoIterator<Item = (&'static str, ToolDefinition)>) -> Toolbox {
	definitions.into_iter().map(|(name, d)| (name.to_owned(), d)).collect()
}

/// An environment with nothing but an empty program search path.
pub fn bare_environment(id: &str, toolbox: Toolbox) -> MemoryEnvironment {
	let mut env = MemoryEnvironment::new(id, BTreeMap::new(), toolbox);
	env.set("ENV", Value::Map(BTreeMap::from([("PATH".to_owned(), String::new())])));
	env
}

fn path_string(path: &Path) -> Result<String> {
	path.to_str()
		.map(str::to_owned)
		.ok_or_else(|| Error::NonUnicodePath(path.to_owned()))
}

/// A temporary directory holding one empty file per name.
pub fn directory_with(files: &[&str]) -> Result<tempfile::TempDir> {
	let dir = tempfile::tempdir()?;
	for file in files {
		std::fs::write(dir.path().join(file), b"")?;
	}
	Ok(dir)
}

/// Makes `dirs` the library search path of `env`.
pub fn set_library_path(env: &mut MemoryEnvironment, dirs: &[&Path]) -> Result<()> {
	let dirs = dirs.iter().map(|d| path_string(d)).collect::<Result<Vec<_>>>()?;
	env.set("LIBPATH", Value::List(dirs));
	Ok(())
}

/// Makes `dirs` the program search path of `env`.
pub fn set_program_path(env: &mut MemoryEnvironment, dirs: &[&Path]) -> Result<()> {
	let path = std::env::join_paths(dirs).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
	let path = path.into_string().map_err(|p| Error::NonUnicodePath(p.into()))?;
	env.set("ENV", Value::Map(BTreeMap::from([("PATH".to_owned(), path)])));
	Ok(())
}

/// A check with a fixed outcome that counts how often it ran.
pub fn counting_check<E: 'static>(name: &str, passes: bool) -> (Check<E>, Rc<Cell<usize>>) {
	let runs = Rc::new(Cell::new(0));
	let counter = runs.clone();
	let check = Check::new(name, move |_| {
		counter.set(counter.get() + 1);
		Ok(passes)
	});
	(check, runs)
}

#[cfg(test)]
mod tests {
	use super::*;
	use confex::BuildEnvironment;

	#[test]
	fn program_path_is_set() {
		let dir = directory_with(&["cc"]).unwrap();
		let mut env = bare_environment("fixture", toolbox());
		set_program_path(&mut env, &[dir.path()]).unwrap();

		let path = env.get("ENV").and_then(Value::as_map).and_then(|m| m.get("PATH")).unwrap();
		assert_eq!(path, dir.path().to_str().unwrap());
	}
}
