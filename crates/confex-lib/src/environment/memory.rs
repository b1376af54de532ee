//! A data driven [`BuildEnvironment`] whose tools are declared up front.
//!
//! Useful for dry runs, scripted scenarios and tests where the real build system is unavailable.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use serde::{Serialize, Deserialize};

use super::*;

/// What applying a tool does to a [`MemoryEnvironment`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolDefinition {
	/// Tools applied before this one, making this tool a toolchain.
	pub loads: Vec<String>,
	/// Keys replaced on every application.
	pub set: BTreeMap<String, Value>,
	/// Keys only set when not already present.
	pub defaults: BTreeMap<String, Value>,
	/// List keys extended on every application.
	pub append: BTreeMap<String, Vec<String>>,
}

impl ToolDefinition {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn loads(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.loads.extend(tools.into_iter().map(Into::into));
		self
	}

	pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.set.insert(key.into(), value.into());
		self
	}

	pub fn default_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.defaults.insert(key.into(), value.into());
		self
	}

	pub fn append(mut self, key: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.append.entry(key.into()).or_default().extend(values.into_iter().map(Into::into));
		self
	}
}

pub type Toolbox = BTreeMap<String, ToolDefinition>;

#[derive(Debug, Clone)]
pub struct MemoryEnvironment {
	id: EnvironmentId,
	values: BTreeMap<String, Value>,
	tools: Vec<String>,
	toolbox: Rc<Toolbox>,
}

impl MemoryEnvironment {
	pub fn new(id: impl Into<EnvironmentId>, values: BTreeMap<String, Value>, toolbox: Toolbox) -> Self {
		Self {
			id: id.into(),
			values,
			tools: Vec::new(),
			toolbox: Rc::new(toolbox),
		}
	}

	pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.values.insert(key.into(), value.into());
	}

	pub fn values(&self) -> &BTreeMap<String, Value> {
		&self.values
	}

	/// Looks `tool` up in the toolbox first, then as `<tool>.json` in each `toolpath` directory.
	fn definition(&self, tool: &str, toolpath: &[PathBuf]) -> Result<ToolDefinition, ToolError> {
		if let Some(definition) = self.toolbox.get(tool) {
			return Ok(definition.clone());
		}

		for dir in toolpath {
			let path = dir.join(format!("{}.json", tool));
			if !path.is_file() { continue; }

			let load_error = |reason: String| ToolError::Load { tool: tool.to_owned(), reason };
			let data = std::fs::read_to_string(&path).map_err(|e| load_error(e.to_string()))?;
			return serde_json::from_str(&data).map_err(|e| load_error(e.to_string()));
		}

		Err(ToolError::NotFound(tool.to_owned()))
	}

	fn apply_recursive(&mut self, tool: &str, toolpath: &[PathBuf], loading: &mut Vec<String>, touched: &mut Vec<String>) -> Result<(), ToolError> {
		/* A toolchain that (indirectly) loads itself would never finish */
		if loading.iter().any(|t| t == tool) {
			log::warn!("Tool '{}' loads itself, skipping.", tool);
			return Ok(());
		}

		let definition = self.definition(tool, toolpath)?;
		loading.push(tool.to_owned());

		for sub_tool in &definition.loads {
			self.apply_recursive(sub_tool, toolpath, loading, touched)?;
		}

		for (key, value) in definition.set {
			touched.push(key.clone());
			self.values.insert(key, value);
		}

		for (key, value) in definition.defaults {
			if !self.values.contains_key(&key) {
				touched.push(key.clone());
				self.values.insert(key, value);
			}
		}

		for (key, extra) in definition.append {
			touched.push(key.clone());
			let entry = self.values.entry(key).or_insert_with(|| Value::List(Vec::new()));
			match entry {
				Value::List(list) => list.extend(extra),
				Value::Str(s) => {
					let mut list = vec![std::mem::take(s)];
					list.extend(extra);
					*entry = Value::List(list);
				},
				Value::Map(_) => log::warn!("Tool '{}' can't append to a map value.", tool),
			}
		}

		loading.pop();
		self.tools.push(tool.to_owned());
		Ok(())
	}
}

impl BuildEnvironment for MemoryEnvironment {
	fn identity(&self) -> EnvironmentId {
		self.id.clone()
	}

	fn tools(&self) -> &[String] {
		&self.tools
	}

	fn get(&self, key: &str) -> Option<&Value> {
		self.values.get(key)
	}

	fn apply_tool(&mut self, tool: &str, toolpath: &[PathBuf]) -> Result<Vec<String>, ToolError> {
		let mut touched = Vec::new();
		self.apply_recursive(tool, toolpath, &mut Vec::new(), &mut touched)?;
		touched.sort();
		touched.dedup();
		Ok(touched)
	}

	fn truncate_tools(&mut self, len: usize) {
		self.tools.truncate(len);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn toolbox() -> Toolbox {
		let mut toolbox = Toolbox::new();
		toolbox.insert("gcc".into(), ToolDefinition::new().set("CC", "gcc").set("CCFLAGS", "-O2"));
		toolbox.insert("gas".into(), ToolDefinition::new().set("AS", "as").default_value("ASPP", "gcc"));
		toolbox.insert("mingw".into(), ToolDefinition::new().loads(["gcc", "gas"]).append("LIBPATH", ["/mingw/lib"]));
		toolbox.insert("loop".into(), ToolDefinition::new().loads(["loop"]).set("LOOP", "1"));
		toolbox
	}

	#[test]
	fn toolchain_loads_sub_tools_first() {
		let mut env = MemoryEnvironment::new("test", Default::default(), toolbox());
		let touched = env.apply_tool("mingw", &[]).unwrap();

		assert_eq!(env.tools(), ["gcc", "gas", "mingw"]);
		assert_eq!(touched, ["AS", "ASPP", "CC", "CCFLAGS", "LIBPATH"]);
		assert_eq!(env.get("LIBPATH"), Some(&Value::List(vec!["/mingw/lib".into()])));
	}

	#[test]
	fn defaults_are_only_touched_once() {
		let mut env = MemoryEnvironment::new("test", Default::default(), toolbox());
		env.apply_tool("gas", &[]).unwrap();
		let touched = env.apply_tool("gas", &[]).unwrap();
		assert_eq!(touched, ["AS"]);
	}

	#[test]
	fn self_loading_tool_terminates() {
		let mut env = MemoryEnvironment::new("test", Default::default(), toolbox());
		env.apply_tool("loop", &[]).unwrap();
		assert_eq!(env.tools(), ["loop"]);
	}

	#[test]
	fn unknown_tool() {
		let mut env = MemoryEnvironment::new("test", Default::default(), toolbox());
		assert!(matches!(env.apply_tool("msvc", &[]), Err(ToolError::NotFound(_))));
	}
}
