//! Requirement descriptors and the checks that validate them.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::config_header::ConfigHeader;

pub type CheckError = Box<dyn std::error::Error>;
pub type CheckResult = Result<bool, CheckError>;

/// What a check gets to look at while it runs.
pub struct CheckContext<'a, E> {
	env: &'a E,
	header: &'a RefCell<ConfigHeader>,
	header_authority: bool,
}

impl<'a, E> CheckContext<'a, E> {
	pub(crate) fn new(env: &'a E, header: &'a RefCell<ConfigHeader>, header_authority: bool) -> Self {
		Self { env, header, header_authority }
	}

	/// The environment as configured so far.
	pub fn env(&self) -> &E {
		self.env
	}

	/// Records a define in the configuration header.
	///
	/// Ignored (returning `false`) while checks are only being used to search for a configuration.
	pub fn define(&self, name: impl Into<String>, value: Option<String>) -> bool {
		if self.header_authority {
			self.header.borrow_mut().define(name, value);
		}
		self.header_authority
	}
}

/// A named validation probe.
///
/// Checks are compared by identity: clones of one check are the same check,
/// two checks built from identical closures are not.
pub struct Check<E> {
	name: String,
	probe: Rc<dyn Fn(&CheckContext<E>) -> CheckResult>,
}

impl<E> Check<E> {
	pub fn new(name: impl Into<String>, probe: impl Fn(&CheckContext<E>) -> CheckResult + 'static) -> Self {
		Self {
			name: name.into(),
			probe: Rc::new(probe),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Runs the check, an error counts as a failure.
	pub fn run(&self, ctx: &CheckContext<E>) -> bool {
		match (self.probe)(ctx) {
			Ok(passed) => {
				log::trace!("Check '{}': {}", self.name, if passed { "passed" } else { "failed" });
				passed
			},
			Err(e) => {
				log::debug!("Check '{}' errored: {}", self.name, e);
				false
			},
		}
	}
}

impl<E> Clone for Check<E> {
	fn clone(&self) -> Self {
		Self {
			name: self.name.clone(),
			probe: self.probe.clone(),
		}
	}
}

impl<E> PartialEq for Check<E> {
	fn eq(&self, other: &Self) -> bool {
		std::ptr::eq(Rc::as_ptr(&self.probe) as *const (), Rc::as_ptr(&other.probe) as *const ())
	}
}

impl<E> Eq for Check<E> {}

impl<E> std::fmt::Debug for Check<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("Check").field(&self.name).finish()
	}
}

/// A requirement on the environment.
///
/// - `components`: candidates, any one of which satisfies the requirement. Empty for a requirement
///   that only exists to run checks (or anchor dependencies), such a specification is never bound.
/// - `checks`: all must pass for the chosen binding to be valid.
/// - `dependencies`: specifications that are validated again whenever this one is.
pub struct Specification<E> {
	name: String,
	components: Vec<String>,
	checks: Vec<Check<E>>,
	dependencies: Vec<Rc<Specification<E>>>,
}

impl<E> Specification<E> {
	/// Duplicates are dropped from every list, keeping the first occurrence.
	pub fn new(
		name: impl Into<String>,
		components: impl IntoIterator<Item = impl Into<String>>,
		checks: impl IntoIterator<Item = Check<E>>,
		dependencies: impl IntoIterator<Item = Rc<Specification<E>>>,
	) -> Self {
		let mut seen = HashSet::new();
		let components = components.into_iter()
			.map(Into::into)
			.filter(|c: &String| seen.insert(c.clone()))
			.collect();

		let mut unique_checks: Vec<Check<E>> = Vec::new();
		for check in checks {
			if !unique_checks.contains(&check) {
				unique_checks.push(check);
			}
		}

		let mut unique_dependencies: Vec<Rc<Specification<E>>> = Vec::new();
		for dep in dependencies {
			if !unique_dependencies.iter().any(|d| Rc::ptr_eq(d, &dep)) {
				unique_dependencies.push(dep);
			}
		}

		Self {
			name: name.into(),
			components,
			checks: unique_checks,
			dependencies: unique_dependencies,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn components(&self) -> &[String] {
		&self.components
	}

	pub fn checks(&self) -> &[Check<E>] {
		&self.checks
	}

	pub fn dependencies(&self) -> &[Rc<Specification<E>>] {
		&self.dependencies
	}

	pub fn has_check(&self, check: &Check<E>) -> bool {
		self.checks.contains(check)
	}

	/// Whether `other` is one of this specification's direct dependencies.
	pub fn depends_on(&self, other: &Specification<E>) -> bool {
		self.dependencies.iter().any(|d| std::ptr::eq(Rc::as_ptr(d), other))
	}
}

impl<E> std::fmt::Debug for Specification<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Specification")
			.field("name", &self.name)
			.field("components", &self.components)
			.field("checks", &self.checks)
			.field("dependencies", &self.dependencies.iter().map(|d| d.name()).collect::<Vec<_>>())
			.finish()
	}
}
