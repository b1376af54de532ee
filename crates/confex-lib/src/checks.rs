//! Checks used as defaults by [`crate::Configure`], usable directly as well.

use std::path::PathBuf;

use crate::environment::{BuildEnvironment, Value};
use crate::specification::{Check, CheckContext};

/// Passes if one of the directories listed in `key` directly contains a file whose name contains `value`.
pub fn dir_contains<E: BuildEnvironment>(key: impl Into<String>, value: impl Into<String>) -> Check<E> {
	let key = key.into();
	let value = value.into();

	Check::new(format!("'{}' present in {}", value, key), move |ctx: &CheckContext<E>| {
		let dirs = match ctx.env().get(&key).and_then(Value::as_list) {
			Some(dirs) => dirs,
			None => return Ok(false),
		};

		for dir in dirs {
			for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
				let entry = match entry {
					Ok(e) => e,
					Err(e) => {
						log::trace!("Skipping unreadable entry in {}: {}", dir, e);
						continue;
					},
				};

				if entry.file_type().is_file() && entry.file_name().to_string_lossy().contains(value.as_str()) {
					return Ok(true);
				}
			}
		}

		Ok(false)
	})
}

/// Passes if `component` holds exactly `value`.
pub fn component_value<E: BuildEnvironment>(component: impl Into<String>, value: impl Into<Value>) -> Check<E> {
	let component = component.into();
	let value = value.into();

	Check::new(format!("{} is {:?}", component, value), move |ctx: &CheckContext<E>| {
		Ok(ctx.env().get(&component) == Some(&value))
	})
}

/// Directories searched for programs, taken from `ENV["PATH"]`.
pub fn program_search_path<E: BuildEnvironment>(env: &E) -> Vec<PathBuf> {
	env.get("ENV")
		.and_then(Value::as_map)
		.and_then(|vars| vars.get("PATH"))
		.map(|path| std::env::split_paths(path).collect())
		.unwrap_or_default()
}

/// Passes if `name` is an executable file on the environment's program search path.
pub fn program<E: BuildEnvironment>(name: impl Into<String>) -> Check<E> {
	let name = name.into();

	Check::new(format!("program '{}'", name), move |ctx: &CheckContext<E>| {
		let mut file_names = vec![name.clone()];
		if !std::env::consts::EXE_SUFFIX.is_empty() && !name.ends_with(std::env::consts::EXE_SUFFIX) {
			file_names.push(format!("{}{}", name, std::env::consts::EXE_SUFFIX));
		}

		let found = program_search_path(ctx.env()).iter()
			.flat_map(|dir| file_names.iter().map(move |f| dir.join(f)))
			.find(|path| path.is_file());

		if let Some(path) = &found {
			log::trace!("Found program '{}' at {}", name, path.display());
		}
		Ok(found.is_some())
	})
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::collections::BTreeMap;

	use super::*;
	use crate::{CheckContext, ConfigHeader, MemoryEnvironment};

	fn env_with(key: &str, value: Value) -> MemoryEnvironment {
		let mut values = BTreeMap::new();
		values.insert(key.to_owned(), value);
		MemoryEnvironment::new("checks", values, Default::default())
	}

	fn run(check: &Check<MemoryEnvironment>, env: &MemoryEnvironment) -> bool {
		let header = RefCell::new(ConfigHeader::default());
		check.run(&CheckContext::new(env, &header, false))
	}

	#[test]
	fn dir_contains_searches_top_level_only() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("libz.a"), b"").unwrap();
		std::fs::create_dir(dir.path().join("nested")).unwrap();
		std::fs::write(dir.path().join("nested").join("libbz2.a"), b"").unwrap();

		let env = env_with("LIBPATH", Value::List(vec![dir.path().to_string_lossy().into_owned()]));
		assert!(run(&dir_contains("LIBPATH", "z"), &env));
		assert!(!run(&dir_contains("LIBPATH", "bz2"), &env));
		assert!(!run(&dir_contains("CPPPATH", "z"), &env));
	}

	#[test]
	fn program_uses_env_path() {
		let dir = tempfile::tempdir().unwrap();
		let exe = format!("pkg-config{}", std::env::consts::EXE_SUFFIX);
		std::fs::write(dir.path().join(exe), b"").unwrap();

		let mut vars = BTreeMap::new();
		vars.insert("PATH".to_owned(), dir.path().to_string_lossy().into_owned());
		let env = env_with("ENV", Value::Map(vars));

		assert!(run(&program("pkg-config"), &env));
		assert!(!run(&program("doesnotexist"), &env));
		assert!(!run(&program("pkg-config"), &env_with("CC", "gcc".into())));
	}

	#[test]
	fn component_value_compares() {
		let env = env_with("CC", "gcc".into());
		assert!(run(&component_value("CC", "gcc"), &env));
		assert!(!run(&component_value("CC", "clang"), &env));
	}
}
