//! The request surface: ask for components, libraries and programs, then finish.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Serialize, Deserialize};

use crate::augment_resolver::AugmentResolver;
use crate::catalog::ToolRegistry;
use crate::config::ConfigureOptions;
use crate::config_header::ConfigHeader;
use crate::environment::BuildEnvironment;
use crate::error::{Error, Result};
use crate::specification::{Check, Specification};

/// Kind of request recorded in listing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestClass {
	Component,
	Library,
	Program,
}

/// Names requested while in listing mode, per request class, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Listing(BTreeMap<RequestClass, Vec<String>>);

impl Listing {
	pub fn record(&mut self, class: RequestClass, name: impl Into<String>) {
		self.0.entry(class).or_default().push(name.into());
	}

	pub fn names(&self, class: RequestClass) -> &[String] {
		self.0.get(&class).map(Vec::as_slice).unwrap_or_default()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// How one resolved requirement ended up being satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
	pub requirement: String,
	pub component: Option<String>,
	/// `None` for components taken from the base environment.
	pub tool: Option<String>,
}

/// Outcome of [`Configure::finish`].
#[derive(Debug)]
pub struct Finished<E> {
	pub environment: E,
	pub header: ConfigHeader,
	pub listing: Option<Listing>,
	/// In application order.
	pub bindings: Vec<Binding>,
}

/// A configure session over one base environment.
pub struct Configure<E: BuildEnvironment> {
	resolver: AugmentResolver<E>,
	options: ConfigureOptions,
	listing: Option<Listing>,
}

impl<E: BuildEnvironment> Configure<E> {
	pub fn new(env: E, registry: &mut ToolRegistry, options: ConfigureOptions) -> Self {
		let listing = options.listing().then(Listing::default);
		Self {
			resolver: AugmentResolver::new(env, registry),
			options,
			listing,
		}
	}

	pub fn options(&self) -> &ConfigureOptions {
		&self.options
	}

	pub fn resolver(&self) -> &AugmentResolver<E> {
		&self.resolver
	}

	/// `None` unless listing mode is enabled.
	pub fn listing(&self) -> Option<&Listing> {
		self.listing.as_ref()
	}

	/// Requests any one of `candidates`, validated by `checks`.
	///
	/// `name` defaults to the candidates joined by `|`.
	pub fn find_component(
		&mut self,
		candidates: &[&str],
		checks: Vec<Check<E>>,
		name: Option<&str>,
		depends: Vec<Rc<Specification<E>>>,
	) -> Result<Rc<Specification<E>>> {
		if candidates.is_empty() || candidates.iter().any(|c| c.is_empty()) {
			return Err(Error::InvalidInput("component not specified".into()));
		}

		let name = name.map(str::to_owned).unwrap_or_else(|| candidates.join("|"));
		let spec = Rc::new(Specification::new(name.clone(), candidates.iter().copied(), checks, depends));

		if self.is_listing(RequestClass::Component, &name) {
			return Ok(spec);
		}

		self.resolve(spec, Error::ToolNotFound(name))
	}

	/// Requests library `name`.
	///
	/// Without `checks` the library is looked for in the directories of `LIBPATH`,
	/// otherwise the checks alone decide and no component is bound.
	pub fn find_library(&mut self, name: &str, checks: Vec<Check<E>>, depends: Vec<Rc<Specification<E>>>) -> Result<Rc<Specification<E>>> {
		if name.is_empty() {
			return Err(Error::InvalidInput("library name not specified".into()));
		}

		if self.is_listing(RequestClass::Library, name) {
			return Ok(Rc::new(Specification::new(name, Vec::<String>::new(), checks, depends)));
		}

		let spec = if checks.is_empty() {
			Specification::new(name, ["LIBPATH"], [crate::checks::dir_contains("LIBPATH", name)], depends)
		} else {
			Specification::new(name, Vec::<String>::new(), checks, depends)
		};

		self.resolve(Rc::new(spec), Error::LibraryNotFound(name.to_owned()))
	}

	/// Requests program `name`, found through the `ENV` component and additionally validated by `checks`.
	pub fn find_program(&mut self, name: &str, checks: Vec<Check<E>>) -> Result<Rc<Specification<E>>> {
		if name.is_empty() {
			return Err(Error::InvalidInput("program name not specified".into()));
		}

		let mut all_checks = vec![crate::checks::program(name)];
		all_checks.extend(checks);
		let spec = Rc::new(Specification::new(name, ["ENV"], all_checks, []));

		if self.is_listing(RequestClass::Program, name) {
			return Ok(spec);
		}

		self.resolve(spec, Error::ProgramNotFound(name.to_owned()))
	}

	/// Applies every resolved requirement and writes the configuration header if one is configured.
	pub fn finish(self) -> Result<Finished<E>> {
		let Self { mut resolver, options, listing } = self;

		let failed = resolver.finalize();
		if !failed.is_empty() {
			log::warn!("{} check(s) failed while finishing configuration.", failed.len());
		}

		let bindings = resolver.augments().iter()
			.map(|a| Binding {
				requirement: a.specification().name().to_owned(),
				component: a.component().map(str::to_owned),
				tool: a.tool().map(str::to_owned),
			})
			.collect();

		let (environment, header, _) = resolver.into_parts();

		if let Some(path) = options.config_header() {
			header.write_to(path)?;
		}

		Ok(Finished {
			environment,
			header,
			listing,
			bindings,
		})
	}

	fn resolve(&mut self, spec: Rc<Specification<E>>, not_found: Error) -> Result<Rc<Specification<E>>> {
		if self.resolver.add_augment(spec.clone()) {
			Ok(spec)
		} else {
			log::info!("{}", not_found);
			Err(not_found)
		}
	}

	/// Records the request and returns `true` when in listing mode.
	fn is_listing(&mut self, class: RequestClass, name: &str) -> bool {
		match &mut self.listing {
			Some(listing) => {
				listing.record(class, name);
				true
			},
			None => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn listing_keeps_request_order_per_class() {
		let mut listing = Listing::default();
		listing.record(RequestClass::Library, "z");
		listing.record(RequestClass::Program, "pkg-config");
		listing.record(RequestClass::Library, "bz2");

		assert_eq!(listing.names(RequestClass::Library), ["z", "bz2"]);
		assert_eq!(listing.names(RequestClass::Program), ["pkg-config"]);
		assert!(listing.names(RequestClass::Component).is_empty());
	}

	#[test]
	fn listing_serializes_by_class_name() {
		let mut listing = Listing::default();
		listing.record(RequestClass::Component, "CC");

		assert_eq!(serde_json::to_string(&listing).unwrap(), r#"{"COMPONENT":["CC"]}"#);
	}
}
