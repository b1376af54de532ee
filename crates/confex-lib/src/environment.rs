//! The build environment contract the resolver works against.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Serialize, Deserialize};

use crate::catalog::{ComponentFlags, Discovery};

pub mod memory;

/// Key under which an environment records the names of the tools applied to it.
pub const TOOLS_KEY: &str = "TOOLS";

/// Identity of the environment a resolver was created from.
///
/// Resolvers created from environments with equal identities share one [`crate::ToolCatalog`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnvironmentId(pub String);

impl std::fmt::Display for EnvironmentId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for EnvironmentId {
	fn from(value: &str) -> Self {
		EnvironmentId(value.to_owned())
	}
}

/// The value held by an environment key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
	Str(String),
	List(Vec<String>),
	Map(BTreeMap<String, String>),
}

impl Value {
	/// Strings are treated as a list with a single entry.
	pub fn as_list(&self) -> Option<Vec<&str>> {
		match self {
			Value::Str(s) => Some(vec![s.as_str()]),
			Value::List(l) => Some(l.iter().map(String::as_str).collect()),
			Value::Map(_) => None,
		}
	}

	pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
		if let Value::Map(m) = self { Some(m) } else { None }
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Str(value.to_owned())
	}
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
	#[error("tool '{0}' not found.")]
	NotFound(String),
	#[error("tool '{tool}' failed to load: {reason}")]
	Load { tool: String, reason: String },
}

/// A build environment that tools can be applied to.
///
/// Implementations are cheap enough to clone; the resolver keeps an untouched base copy
/// and rebuilds its working environment from it whenever an incremental application isn't possible.
pub trait BuildEnvironment: Clone + 'static {
	fn identity(&self) -> EnvironmentId;

	/// Names of the tools applied so far, in application order.
	fn tools(&self) -> &[String];

	fn get(&self, key: &str) -> Option<&Value>;

	fn contains(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	/// Applies `tool`, returning every key the tool set or modified.
	///
	/// A tool may load other tools, each of which appends to [`BuildEnvironment::tools`].
	fn apply_tool(&mut self, tool: &str, toolpath: &[PathBuf]) -> Result<Vec<String>, ToolError>;

	/// Drops applied tool names past `len`.
	fn truncate_tools(&mut self, len: usize);
}

/// Keys that describe an environment capability rather than tool bookkeeping or option plumbing.
pub fn is_component_key(key: &str) -> bool {
	const IGNORED_SUFFIXES: [&str; 5] = ["PREFIX", "SUFFIX", "FLAGS", "COM", "VERSION"];

	let has_cased = key.chars().any(char::is_alphabetic);
	let upper = has_cased && !key.chars().any(char::is_lowercase);

	key != TOOLS_KEY
		&& !key.starts_with('_')
		&& upper
		&& !IGNORED_SUFFIXES.iter().any(|s| key.ends_with(s))
}

/// Probes `tool` against a copy of `base`.
///
/// Every component key the first application touches is flagged [`ComponentFlags::NO_OVERLAP`].
/// The tool is then applied a second time on top of itself and any key touched again loses the flag,
/// those keys are safe for another tool to set as well.
pub fn discover_tool<E: BuildEnvironment>(base: &E, tool: &str, toolpath: &[PathBuf]) -> Result<Discovery, ToolError> {
	let original_len = base.tools().len();
	let mut probe = base.clone();

	let touched = probe.apply_tool(tool, toolpath)?;
	let chain = probe.tools().get(original_len..).map(<[String]>::to_vec).unwrap_or_default();

	let mut components: BTreeMap<String, ComponentFlags> = touched.into_iter()
		.filter(|k| is_component_key(k))
		.map(|k| (k, ComponentFlags::NO_OVERLAP))
		.collect();

	for key in probe.apply_tool(tool, toolpath)? {
		if is_component_key(&key) {
			components.insert(key, ComponentFlags::empty());
		}
	}

	log::trace!("Discovered tool '{}': chain {:?}, components {:?}", tool, chain, components);
	Ok(Discovery { chain, components })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn component_keys() {
		assert!(is_component_key("CC"));
		assert!(is_component_key("LIBPATH"));
		assert!(is_component_key("ENV"));
		assert!(is_component_key("AR_2"));

		assert!(!is_component_key("TOOLS"));
		assert!(!is_component_key("_LIBFLAGS"));
		assert!(!is_component_key("Cc"));
		assert!(!is_component_key("OBJSUFFIX"));
		assert!(!is_component_key("LIBPREFIX"));
		assert!(!is_component_key("CCFLAGS"));
		assert!(!is_component_key("LINKCOM"));
		assert!(!is_component_key("CCVERSION"));
		assert!(!is_component_key("123"));
	}

	#[test]
	fn value_lists() {
		assert_eq!(Value::from("a").as_list(), Some(vec!["a"]));
		assert_eq!(Value::List(vec!["a".into(), "b".into()]).as_list(), Some(vec!["a", "b"]));
		assert_eq!(Value::Map(Default::default()).as_list(), None);
	}
}
