//! Scenario files: a base environment, the tools it can load and the requirements to resolve.
//!
//! ```json
//! {
//!   "environment": { "id": "host", "values": { "CC": "cc" }, "tools": { "gcc": { "set": { "CC": "gcc" } } } },
//!   "requests": [
//!     { "component": { "candidates": ["CC"], "checks": [{ "define": { "name": "HAVE_CC" } }] } },
//!     { "library": { "name": "z" } },
//!     { "program": { "name": "pkg-config" } }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::rc::Rc;

use serde::{Serialize, Deserialize};

use confex::environment::memory::Toolbox;
use confex::{checks, Check, CheckContext, Configure, MemoryEnvironment, Specification, Value};

use crate::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSpec {
	pub id: String,
	#[serde(default)]
	pub values: BTreeMap<String, Value>,
	#[serde(default)]
	pub tools: Toolbox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckSpec {
	DirContains { key: String, value: String },
	Program { name: String },
	ComponentValue { component: String, value: Value },
	/// Always passes, recording a define in the configuration header.
	Define { name: String, #[serde(default)] value: Option<String> },
}

impl CheckSpec {
	fn build(&self) -> Check<MemoryEnvironment> {
		match self.clone() {
			CheckSpec::DirContains { key, value } => checks::dir_contains(key, value),
			CheckSpec::Program { name } => checks::program(name),
			CheckSpec::ComponentValue { component, value } => checks::component_value(component, value),
			CheckSpec::Define { name, value } => Check::new(format!("define {}", name), move |ctx: &CheckContext<MemoryEnvironment>| {
				ctx.define(name.clone(), value.clone());
				Ok(true)
			}),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
	Component {
		candidates: Vec<String>,
		#[serde(default)]
		name: Option<String>,
		#[serde(default)]
		checks: Vec<CheckSpec>,
		/// Names of earlier requests.
		#[serde(default)]
		depends: Vec<String>,
	},
	Library {
		name: String,
		#[serde(default)]
		checks: Vec<CheckSpec>,
		#[serde(default)]
		depends: Vec<String>,
	},
	Program {
		name: String,
		#[serde(default)]
		checks: Vec<CheckSpec>,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
	pub environment: EnvironmentSpec,
	#[serde(default)]
	pub requests: Vec<Request>,
}

impl Scenario {
	pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
		let file = std::fs::File::open(path)?;
		Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
	}

	pub fn build_environment(&self) -> MemoryEnvironment {
		MemoryEnvironment::new(self.environment.id.as_str(), self.environment.values.clone(), self.environment.tools.clone())
	}

	/// Submits every request in order, stopping at the first that can't be satisfied.
	pub fn submit(&self, conf: &mut Configure<MemoryEnvironment>) -> Result<(), Error> {
		let mut resolved: HashMap<String, Rc<Specification<MemoryEnvironment>>> = HashMap::new();

		let lookup = |resolved: &HashMap<String, Rc<Specification<MemoryEnvironment>>>, depends: &[String]| {
			depends.iter()
				.map(|d| resolved.get(d).cloned().ok_or_else(|| Error::UnknownDependency(d.clone())))
				.collect::<Result<Vec<_>, _>>()
		};

		for request in &self.requests {
			let spec = match request {
				Request::Component { candidates, name, checks, depends } => {
					let candidates: Vec<&str> = candidates.iter().map(String::as_str).collect();
					let depends = lookup(&resolved, depends)?;
					conf.find_component(&candidates, checks.iter().map(CheckSpec::build).collect(), name.as_deref(), depends)?
				},
				Request::Library { name, checks, depends } => {
					let depends = lookup(&resolved, depends)?;
					conf.find_library(name, checks.iter().map(CheckSpec::build).collect(), depends)?
				},
				Request::Program { name, checks } => {
					conf.find_program(name, checks.iter().map(CheckSpec::build).collect())?
				},
			};

			log::info!("Resolved '{}'", spec.name());
			resolved.insert(spec.name().to_owned(), spec);
		}

		Ok(())
	}
}
