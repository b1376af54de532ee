//! Binding specifications to concrete (component, tool) pairs.
//!
//! # Process
//! Each call to [`AugmentResolver::add_augment`] tries to extend the resolved set by one augment:
//! 1. The new specification is bound to its first binding: a candidate already present in the base
//! environment, else the first catalog tool providing a candidate.
//! 1. All augments are ordered so no tool shadows a component another augment relies on ([`ordering`]).
//! 1. Tools of augments not yet known to be valid are applied and their checks run ([`application`]).
//! 1. Incompatible pairs and failed checks push augments on to their next binding and the process repeats.
//!
//! Every binding is a position in a fixed enumeration (native candidates first, then the catalog's
//! tool × candidate pairs), so moving an augment "by one" is always well defined and the search is finite.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::catalog::{ToolCatalog, ToolRegistry};
use crate::config_header::ConfigHeader;
use crate::environment::{discover_tool, BuildEnvironment};
use crate::specification::{Check, CheckContext, Specification};

mod application;
mod ordering;
pub use ordering::order_augments;
pub use ordering::OrderOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AugmentId(usize);

/// A specification together with the component and tool currently chosen to satisfy it.
pub struct Augment<E> {
	id: AugmentId,
	specification: Rc<Specification<E>>,
	/// `None` only when the specification has no components.
	component: Option<String>,
	/// `None` when the component comes from the base environment.
	tool: Option<String>,
	valid: bool,
}

impl<E> Augment<E> {
	pub(crate) fn new(id: AugmentId, specification: Rc<Specification<E>>) -> Self {
		Self {
			id,
			specification,
			component: None,
			tool: None,
			valid: false,
		}
	}

	pub fn id(&self) -> AugmentId {
		self.id
	}

	pub fn specification(&self) -> &Rc<Specification<E>> {
		&self.specification
	}

	pub fn component(&self) -> Option<&str> {
		self.component.as_deref()
	}

	pub fn tool(&self) -> Option<&str> {
		self.tool.as_deref()
	}

	pub fn is_valid(&self) -> bool {
		self.valid
	}
}

impl<E> Clone for Augment<E> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			specification: self.specification.clone(),
			component: self.component.clone(),
			tool: self.tool.clone(),
			valid: self.valid,
		}
	}
}

impl<E> std::fmt::Debug for Augment<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Augment")
			.field("id", &self.id)
			.field("specification", &self.specification.name())
			.field("component", &self.component)
			.field("tool", &self.tool)
			.field("valid", &self.valid)
			.finish()
	}
}

/// Net rebinding needed to go from the `last` change record to `next`, per augment.
///
/// Augments whose moves cancel out are dropped.
fn change_delta(next: &[AugmentId], last: &[AugmentId]) -> Vec<(AugmentId, isize)> {
	let mut delta: Vec<(AugmentId, isize)> = Vec::new();

	for (ids, step) in [(next, 1), (last, -1)] {
		for id in ids {
			match delta.iter().position(|(d, _)| d == id) {
				Some(pos) => {
					delta[pos].1 += step;
					if delta[pos].1 == 0 {
						delta.remove(pos);
					}
				},
				None => delta.push((*id, step)),
			}
		}
	}

	delta
}

type Assignment = Vec<(AugmentId, Option<String>, Option<String>)>;

fn assignment<E>(augments: &[Augment<E>]) -> Assignment {
	let mut assignment: Assignment = augments.iter()
		.map(|a| (a.id, a.component.clone(), a.tool.clone()))
		.collect();
	assignment.sort();
	assignment
}

/// The resolution engine: owns the resolved augments and the live working environment.
pub struct AugmentResolver<E: BuildEnvironment> {
	/// Never modified, only cloned.
	base: E,
	current: E,
	/// In application order.
	augments: Vec<Augment<E>>,
	catalog: Rc<RefCell<ToolCatalog>>,
	applied_tools: Vec<String>,
	applied_checks: Vec<Check<E>>,
	header: RefCell<ConfigHeader>,
	header_authority: bool,
	next_id: usize,
}

impl<E: BuildEnvironment> AugmentResolver<E> {
	/// Creates a resolver around `env`, using (or creating) the registry's catalog for the environment's identity.
	pub fn new(env: E, registry: &mut ToolRegistry) -> Self {
		let catalog = registry.catalog(&env.identity(), env.tools());
		Self {
			base: env.clone(),
			current: env,
			augments: Vec::new(),
			catalog,
			applied_tools: Vec::new(),
			applied_checks: Vec::new(),
			header: RefCell::new(ConfigHeader::default()),
			header_authority: false,
			next_id: 0,
		}
	}

	pub fn augments(&self) -> &[Augment<E>] {
		&self.augments
	}

	/// The working environment.
	pub fn environment(&self) -> &E {
		&self.current
	}

	pub fn base(&self) -> &E {
		&self.base
	}

	pub fn catalog(&self) -> &Rc<RefCell<ToolCatalog>> {
		&self.catalog
	}

	pub fn applied_tools(&self) -> &[String] {
		&self.applied_tools
	}

	pub fn header(&self) -> std::cell::Ref<'_, ConfigHeader> {
		self.header.borrow()
	}

	pub fn into_parts(self) -> (E, ConfigHeader, Vec<Augment<E>>) {
		(self.current, self.header.into_inner(), self.augments)
	}

	/// Extends the resolved set with an augment for `specification`.
	///
	/// Bindings of previously resolved augments may change. On failure the resolved set is left untouched.
	pub fn add_augment(&mut self, specification: Rc<Specification<E>>) -> bool {
		log::debug!("Adding environment augment '{}'...", specification.name());

		let mut augments = self.augments.clone();
		let id = AugmentId(self.next_id);
		self.next_id += 1;
		augments.push(Augment::new(id, specification.clone()));

		if specification.components().is_empty() {
			/* Nothing to bind, the checks just have to pass */
			let invalid = self.validate_augments(&mut augments);
			if invalid.is_empty() {
				self.augments = augments;
				return true;
			}
			return false;
		}

		log::debug!("Configuring augment component...");
		if let Some(augment) = augments.last_mut() {
			if !self.rebind(augment, 0) {
				log::debug!("No component available for '{}'.", specification.name());
				return false;
			}
		}

		let mut change: Vec<AugmentId> = Vec::new();
		let mut changes: Vec<Vec<AugmentId>> = Vec::new();
		let mut tried: HashSet<Assignment> = HashSet::new();
		let mut first_pass = true;

		loop {
			if first_pass {
				first_pass = false;
			} else {
				let Some(next) = changes.pop() else { break };
				let last_change = std::mem::replace(&mut change, next);
				let delta = change_delta(&change, &last_change);

				let mut achieved = 0;
				for (id, offset) in &delta {
					let rebound = match augments.iter_mut().find(|a| a.id == *id) {
						Some(augment) => self.rebind(augment, *offset),
						None => false,
					};
					if !rebound {
						break;
					}
					achieved += 1;
				}

				if achieved < delta.len() {
					/* Keep the record in line with the bindings actually in place */
					change = last_change;
					for (id, offset) in &delta[..achieved] {
						for _ in 0..offset.unsigned_abs() {
							if *offset > 0 {
								change.push(*id);
							} else if let Some(pos) = change.iter().position(|c| c == id) {
								change.remove(pos);
							}
						}
					}

					log::debug!("No alternate component, reconfiguring...");
					continue;
				}
			}

			if !tried.insert(assignment(&augments)) {
				log::trace!("Bindings already tried, skipping.");
				continue;
			}

			let outcome = order_augments(&augments, &self.catalog.borrow());
			match outcome {
				OrderOutcome::Incompatible(a, b) => {
					for id in [a, b] {
						let mut next = change.clone();
						next.push(id);
						changes.push(next);
					}

					log::debug!("Incompatible augment(s), reconfiguring...");
					continue;
				},
				OrderOutcome::Ordered(order) => {
					augments = order.into_iter().map(|i| augments[i].clone()).collect();
				},
			}

			let invalid = self.validate_augments(&mut augments);
			if !invalid.is_empty() {
				/* TODO: also move the dependencies of an invalid augment once the augment itself runs out of bindings */
				change.clear();
				changes = vec![invalid];

				log::debug!("Invalid augment(s), reconfiguring...");
				continue;
			}

			self.augments = augments;
			return true;
		}

		false
	}

	/// Applies every resolved augment from scratch and runs all of their checks with header authority.
	///
	/// Returns the checks that failed.
	pub fn finalize(&mut self) -> Vec<Check<E>> {
		self.header_authority = true;

		let tools: Vec<String> = self.augments.iter().filter_map(|a| a.tool.clone()).collect();
		let checks: Vec<Check<E>> = self.augments.iter()
			.flat_map(|a| a.specification.checks().iter().cloned())
			.collect();

		self.reset_environment();
		let failed = self.apply_env(&tools, true, &checks, &[]);
		for check in &failed {
			log::warn!("Check '{}' failed while finalizing.", check.name());
		}
		failed
	}

	/// Moves `augment` `offset` bindings along the enumeration, forward for positive offsets.
	///
	/// An offset of zero on an unbound augment picks its first binding. Returns `false` (leaving the augment alone)
	/// when the enumeration runs out.
	fn rebind(&self, augment: &mut Augment<E>, offset: isize) -> bool {
		let forward = offset >= 0;
		let mut remaining = offset;
		let components = augment.specification.components();
		let mut binding: Option<(String, Option<String>)> = None;

		if augment.tool.is_none() {
			binding = self.find_native(components, augment.component.as_deref(), &mut remaining)
				.map(|c| (c, None));
		}

		if binding.is_none() {
			let from_tool = augment.tool.is_some();

			/* Natives come before tools, walking back from a native never reaches one */
			if from_tool || forward {
				let (ref_component, ref_tool) = if from_tool {
					(augment.component.as_deref(), augment.tool.as_deref())
				} else {
					(None, None)
				};

				let toolpath = self.catalog.borrow().toolpath().to_vec();
				let base = &self.base;
				let mut discover = |tool: &str| discover_tool(base, tool, &toolpath);

				binding = self.catalog.borrow_mut()
					.get_tool(components, ref_component, ref_tool, &mut remaining, &mut discover)
					.map(|(c, t)| (c, Some(t)));
			}

			if binding.is_none() && from_tool && !forward {
				binding = self.find_native(components, components.last().map(String::as_str), &mut remaining)
					.map(|c| (c, None));
			}
		}

		match binding {
			Some((component, tool)) => {
				log::trace!("Binding '{}' to {} via {}", augment.specification.name(), component, tool.as_deref().unwrap_or("<native>"));
				augment.component = Some(component);
				augment.tool = tool;
				augment.valid = false;
				true
			},
			None => false,
		}
	}

	/// Walks `components` from `ref_component` looking for ones present in the base environment, skipping `remaining` of them.
	fn find_native(&self, components: &[String], ref_component: Option<&str>, remaining: &mut isize) -> Option<String> {
		let forward = *remaining >= 0;
		let mut idx = ref_component
			.and_then(|c| components.iter().position(|x| x == c))
			.unwrap_or(0) as isize;

		while idx >= 0 && (idx as usize) < components.len() {
			let component = &components[idx as usize];
			if self.base.contains(component) {
				match (*remaining).cmp(&0) {
					std::cmp::Ordering::Less => *remaining += 1,
					std::cmp::Ordering::Greater => *remaining -= 1,
					std::cmp::Ordering::Equal => return Some(component.clone()),
				}
			}

			idx += if forward { 1 } else { -1 };
		}

		None
	}

	/// Applies the tools of augments needing validation and runs their checks.
	///
	/// Invalid augments need validation, as do valid augments an invalid augment depends on.
	/// Checks of the latter only run if they haven't already. Returns the ids of the augments left invalid.
	fn validate_augments(&mut self, augments: &mut [Augment<E>]) -> Vec<AugmentId> {
		self.header_authority = false;

		let mut tools = Vec::new();
		let mut required = Vec::new();
		let mut optional = Vec::new();

		for augment in augments.iter() {
			let mut dependency = false;
			if augment.valid {
				dependency = augments.iter()
					.any(|d| !d.valid && d.specification.depends_on(&augment.specification));
				if !dependency {
					continue;
				}
			}

			if let Some(tool) = &augment.tool {
				tools.push(tool.clone());
			}

			let checks = augment.specification.checks().iter().cloned();
			if dependency {
				optional.extend(checks);
			} else {
				required.extend(checks);
			}
		}

		let failed = self.apply_env(&tools, false, &required, &optional);

		let mut invalid = Vec::new();
		for augment in augments.iter_mut() {
			augment.valid = !failed.iter().any(|c| augment.specification.has_check(c));
			if !augment.valid {
				invalid.push(augment.id);
			}
		}
		invalid
	}
}
