//! Memoized knowledge of which tools provide which components.
//!
//! A [`ToolCatalog`] grows lazily: tools are only probed (see [`crate::environment::discover_tool`])
//! when a search walks over them. The catalog order is the search order, so earlier tools are
//! preferred when binding a requirement.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

use crate::environment::{EnvironmentId, ToolError};

bitflags::bitflags! {
	/// Properties of a component as provided by a particular tool.
	#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
	pub struct ComponentFlags: u8 {
		/// The tool shares its underlying implementation between this and other components,
		/// it can't be active next to another provider of them.
		const NO_OVERLAP = 1 << 0;
	}
}

/// The result of probing a single tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
	/// Every tool name loaded when the tool was applied, in load order.
	pub chain: Vec<String>,
	pub components: BTreeMap<String, ComponentFlags>,
}

/// Probes a tool by name.
pub type Discover<'a> = dyn FnMut(&str) -> Result<Discovery, ToolError> + 'a;

#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
	tools: Vec<String>,
	toolpath: Vec<PathBuf>,
	components: HashMap<String, BTreeMap<String, ComponentFlags>>,
	/// Toolchains that were replaced in `tools` by their load chain.
	chains: BTreeMap<String, Vec<String>>,
}

impl ToolCatalog {
	pub fn new(tools: impl IntoIterator<Item = impl Into<String>>, toolpath: Vec<PathBuf>) -> Self {
		let mut seen = HashSet::new();
		let tools = tools.into_iter()
			.map(Into::into)
			.filter(|t: &String| seen.insert(t.clone()))
			.collect();

		Self {
			tools,
			toolpath,
			..Default::default()
		}
	}

	/// Tools in search order.
	pub fn tools(&self) -> &[String] {
		&self.tools
	}

	pub fn toolpath(&self) -> &[PathBuf] {
		&self.toolpath
	}

	pub fn components(&self, tool: &str) -> Option<&BTreeMap<String, ComponentFlags>> {
		self.components.get(tool)
	}

	pub fn chain(&self, tool: &str) -> Option<&[String]> {
		self.chains.get(tool).map(Vec::as_slice)
	}

	pub fn is_probed(&self, tool: &str) -> bool {
		self.components.contains_key(tool)
	}

	pub fn provides(&self, tool: &str, component: &str) -> bool {
		self.flags(tool, component).is_some()
	}

	pub fn flags(&self, tool: &str, component: &str) -> Option<ComponentFlags> {
		self.components.get(tool)?.get(component).copied()
	}

	/// Adds `tool` to the end of the search order (if absent) and probes it (if not yet probed).
	///
	/// A tool that turns out to be a toolchain is replaced in place by its load chain, the tools it loads and itself.
	pub fn add_tool(&mut self, tool: &str, discover: &mut Discover) {
		if self.chains.contains_key(tool) {
			return;
		}

		let idx = match self.tools.iter().position(|t| t == tool) {
			Some(idx) => idx,
			None => {
				self.tools.push(tool.to_owned());
				self.tools.len() - 1
			},
		};

		self.probe(idx, discover);
	}

	fn probe(&mut self, idx: usize, discover: &mut Discover) {
		let name = self.tools[idx].clone();
		if self.components.contains_key(&name) {
			return;
		}

		let discovery = match discover(&name) {
			Ok(d) => d,
			Err(e) => {
				log::warn!("Failed to probe tool '{}', it will not be used: {}", name, e);
				Discovery::default()
			},
		};
		self.components.insert(name.clone(), discovery.components);

		/* The toolchain keeps its place in its own chain, it may set components itself */
		let mut seen = HashSet::new();
		let constituents: Vec<String> = discovery.chain.into_iter()
			.filter(|t| seen.insert(t.clone()))
			.collect();
		if constituents.len() <= 1 {
			return;
		}

		log::trace!("Tool '{}' is a toolchain of {:?}", name, constituents);
		self.tools.remove(idx);

		let mut cursor = idx;
		for tool in &constituents {
			match self.tools.iter().position(|t| t == tool) {
				/* Already searched earlier, keep it there */
				Some(pos) if pos < cursor => {},
				Some(pos) => {
					self.tools.remove(pos);
					self.tools.insert(cursor, tool.clone());
					cursor += 1;
				},
				None => {
					self.tools.insert(cursor, tool.clone());
					cursor += 1;
				},
			}
		}

		self.chains.insert(name, constituents.clone());

		for tool in constituents {
			if let Some(pos) = self.tools.iter().position(|t| *t == tool) {
				self.probe(pos, discover);
			}
		}
	}

	/// Walks (tool, candidate) pairs looking for a tool that provides one of `candidates`.
	///
	/// The walk starts at `ref_tool`/`ref_component` (or the first tool/candidate) and moves forward
	/// when `offset >= 0`, backward otherwise. Each pair where the tool provides the candidate is a match;
	/// `offset.abs()` matches are skipped before the next one is returned as `(component, tool)`.
	/// Skipped matches are taken off `offset`, so a caller can continue the count elsewhere when this returns `None`.
	pub fn get_tool(&mut self, candidates: &[String], ref_component: Option<&str>, ref_tool: Option<&str>, offset: &mut isize, discover: &mut Discover) -> Option<(String, String)> {
		if self.tools.is_empty() || candidates.is_empty() {
			return None;
		}

		let forward = *offset >= 0;
		let mut tool_idx = match ref_tool {
			Some(tool) => self.tools.iter().position(|t| t == tool)? as isize,
			None => 0,
		};
		let mut component_idx = ref_component
			.and_then(|c| candidates.iter().position(|x| x == c))
			.unwrap_or(0) as isize;

		while tool_idx >= 0 && (tool_idx as usize) < self.tools.len() {
			let tool = self.tools[tool_idx as usize].clone();
			if !self.components.contains_key(&tool) {
				/* Probing may replace the tool by a toolchain's constituents, look at this position again */
				self.probe(tool_idx as usize, discover);
				continue;
			}

			while component_idx >= 0 && (component_idx as usize) < candidates.len() {
				let component = &candidates[component_idx as usize];
				if self.provides(&tool, component) {
					match (*offset).cmp(&0) {
						std::cmp::Ordering::Less => *offset += 1,
						std::cmp::Ordering::Greater => *offset -= 1,
						std::cmp::Ordering::Equal => return Some((component.clone(), tool)),
					}
				}

				component_idx += if forward { 1 } else { -1 };
			}

			if forward {
				tool_idx += 1;
				component_idx = 0;
			} else {
				tool_idx -= 1;
				component_idx = candidates.len() as isize - 1;
			}
		}

		None
	}
}

/// Catalogs keyed by the identity of the environment they were created for.
///
/// One registry is meant to live for the whole process, catalogs are only ever grown.
#[derive(Debug, Default)]
pub struct ToolRegistry {
	default_tools: Vec<String>,
	toolpath: Vec<PathBuf>,
	catalogs: HashMap<EnvironmentId, Rc<RefCell<ToolCatalog>>>,
}

impl ToolRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_options(options: &crate::ConfigureOptions) -> Self {
		let mut registry = Self::new();
		registry.cache_tools(options.tools().iter().cloned(), options.toolpath().iter().cloned());
		registry
	}

	/// Sets the tools and tool path new catalogs are seeded from.
	///
	/// Catalogs that already exist are unaffected.
	pub fn cache_tools(&mut self, tools: impl IntoIterator<Item = impl Into<String>>, toolpath: impl IntoIterator<Item = impl Into<PathBuf>>) {
		self.default_tools = tools.into_iter().map(Into::into).collect();
		self.toolpath = toolpath.into_iter().map(Into::into).collect();
	}

	/// Returns the catalog for `id`, creating it (seeded with the default tools followed by `env_tools`) if needed.
	pub fn catalog(&mut self, id: &EnvironmentId, env_tools: &[String]) -> Rc<RefCell<ToolCatalog>> {
		if let Some(catalog) = self.catalogs.get(id) {
			log::trace!("Reusing tool catalog for environment '{}'", id);
			return catalog.clone();
		}

		log::debug!("Creating tool catalog for environment '{}'", id);
		let catalog = Rc::new(RefCell::new(ToolCatalog::new(
			self.default_tools.iter().chain(env_tools.iter()).cloned(),
			self.toolpath.clone(),
		)));
		self.catalogs.insert(id.clone(), catalog.clone());
		catalog
	}

	pub fn len(&self) -> usize {
		self.catalogs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.catalogs.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn discovery(chain: &[&str], components: &[(&str, ComponentFlags)]) -> Discovery {
		Discovery {
			chain: chain.iter().map(|s| s.to_string()).collect(),
			components: components.iter().map(|(c, f)| (c.to_string(), *f)).collect(),
		}
	}

	/// T1 provides CC and AS, T2 provides CC, "chain" loads T3 and T4.
	fn discover(tool: &str) -> Result<Discovery, ToolError> {
		let none = ComponentFlags::empty();
		Ok(match tool {
			"T1" => discovery(&["T1"], &[("CC", none), ("AS", ComponentFlags::NO_OVERLAP)]),
			"T2" => discovery(&["T2"], &[("CC", none)]),
			"T3" => discovery(&["T3"], &[("LINK", none)]),
			"T4" => discovery(&["T4"], &[("AR", none)]),
			"chain" => discovery(&["T3", "T4", "chain"], &[("LINK", none), ("AR", none)]),
			other => return Err(ToolError::NotFound(other.to_owned())),
		})
	}

	fn candidates(c: &[&str]) -> Vec<String> {
		c.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn toolchain_is_replaced_in_place() {
		let mut catalog = ToolCatalog::new(["T1", "chain", "T2"], vec![]);
		catalog.add_tool("chain", &mut discover);

		assert_eq!(catalog.tools(), ["T1", "T3", "T4", "chain", "T2"]);
		assert_eq!(catalog.chain("chain"), Some(["T3".to_string(), "T4".to_string(), "chain".to_string()].as_slice()));
		assert!(catalog.is_probed("T3"));
		assert!(catalog.is_probed("T4"));
		assert!(!catalog.is_probed("T1"));
	}

	#[test]
	fn re_adding_a_known_tool_is_a_no_op() {
		let mut probes = 0;
		let mut counting = |tool: &str| { probes += 1; discover(tool) };

		let mut catalog = ToolCatalog::new(["chain"], vec![]);
		catalog.add_tool("chain", &mut counting);
		catalog.add_tool("chain", &mut counting);
		catalog.add_tool("T3", &mut counting);

		assert_eq!(probes, 3);
		assert_eq!(catalog.tools(), ["T3", "T4", "chain"]);
	}

	#[test]
	fn unknown_tool_provides_nothing() {
		let mut catalog = ToolCatalog::new(["bogus", "T2"], vec![]);
		let mut offset = 0;
		let found = catalog.get_tool(&candidates(&["CC"]), None, None, &mut offset, &mut discover);

		assert_eq!(found, Some(("CC".to_string(), "T2".to_string())));
		assert!(catalog.components("bogus").unwrap().is_empty());
	}

	#[test]
	fn walk_skips_offset_matches() {
		let mut catalog = ToolCatalog::new(["T1", "T2"], vec![]);
		let candidates = candidates(&["AS", "CC"]);

		let mut offset = 0;
		assert_eq!(catalog.get_tool(&candidates, None, None, &mut offset, &mut discover), Some(("AS".into(), "T1".into())));

		let mut offset = 1;
		assert_eq!(catalog.get_tool(&candidates, Some("AS"), Some("T1"), &mut offset, &mut discover), Some(("CC".into(), "T1".into())));

		let mut offset = 1;
		assert_eq!(catalog.get_tool(&candidates, Some("CC"), Some("T1"), &mut offset, &mut discover), Some(("CC".into(), "T2".into())));

		let mut offset = 1;
		assert_eq!(catalog.get_tool(&candidates, Some("CC"), Some("T2"), &mut offset, &mut discover), None);
		assert_eq!(offset, 0);

		let mut offset = -2;
		assert_eq!(catalog.get_tool(&candidates, Some("CC"), Some("T2"), &mut offset, &mut discover), Some(("AS".into(), "T1".into())));
	}

	#[test]
	fn walk_probes_lazily() {
		let mut catalog = ToolCatalog::new(["T1", "chain", "T2"], vec![]);
		let mut offset = 0;
		let found = catalog.get_tool(&candidates(&["CC"]), None, None, &mut offset, &mut discover);

		assert_eq!(found, Some(("CC".to_string(), "T1".to_string())));
		assert!(!catalog.is_probed("chain"));

		let found = catalog.get_tool(&candidates(&["AR"]), None, None, &mut offset, &mut discover);
		assert_eq!(found, Some(("AR".to_string(), "T4".to_string())));
		assert_eq!(catalog.tools(), ["T1", "T3", "T4", "chain", "T2"]);
	}

	#[test]
	fn registry_reuses_catalog_per_identity() {
		let mut registry = ToolRegistry::new();
		registry.cache_tools(["T1"], Vec::<PathBuf>::new());

		let a = registry.catalog(&EnvironmentId::from("a"), &["T2".to_string()]);
		let b = registry.catalog(&EnvironmentId::from("a"), &[]);
		let c = registry.catalog(&EnvironmentId::from("c"), &[]);

		assert!(Rc::ptr_eq(&a, &b));
		assert!(!Rc::ptr_eq(&a, &c));
		assert_eq!(a.borrow().tools(), ["T1", "T2"]);
		assert_eq!(c.borrow().tools(), ["T1"]);
		assert_eq!(registry.len(), 2);
	}
}
