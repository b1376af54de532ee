//! Finding an application order in which every augment's component ends up active.

use super::{Augment, AugmentId};
use crate::catalog::{ComponentFlags, ToolCatalog};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
	/// Indices into the input slice, in application order.
	Ordered(Vec<usize>),
	/// No order works while both augments keep their current bindings.
	Incompatible(AugmentId, AugmentId),
}

fn is_no_overlap(catalog: &ToolCatalog, tool: &str, component: Option<&str>) -> bool {
	component
		.and_then(|c| catalog.flags(tool, c))
		.map_or(false, |f| f.contains(ComponentFlags::NO_OVERLAP))
}

/// Two augments in one tool block that need different exclusive components of that tool.
fn shares_exclusive_tool<E>(catalog: &ToolCatalog, tool: &str, a: &Augment<E>, b: &Augment<E>) -> bool {
	a.component != b.component
		&& is_no_overlap(catalog, tool, a.component.as_deref())
		&& is_no_overlap(catalog, tool, b.component.as_deref())
}

/// Orders `augments` so that no tool applied later shadows a component an earlier augment was bound to.
///
/// Augments are placed in reverse of their current order, which leaves an already ordered list unchanged
/// and keeps environment resets to a minimum. Augments sharing a tool always end up next to each other.
pub fn order_augments<E>(augments: &[Augment<E>], catalog: &ToolCatalog) -> OrderOutcome {
	let mut ordered: Vec<usize> = Vec::with_capacity(augments.len());

	for (idx, augment) in augments.iter().enumerate().rev() {
		let mut active_idx = 0;
		let mut tool_present = false;
		/* Set once this augment's tool is known to clobber something, it then can't be moved after other tools */
		let mut overlaps = match &augment.tool {
			Some(tool) => is_no_overlap(catalog, tool, augment.component.as_deref()),
			None => false,
		};

		for (pos, &placed_idx) in ordered.iter().enumerate() {
			let placed = &augments[placed_idx];

			if let Some(tool) = &augment.tool {
				if placed.tool.as_ref() == Some(tool) {
					if shares_exclusive_tool(catalog, tool, augment, placed) {
						return OrderOutcome::Incompatible(augment.id, placed.id);
					}
					if !tool_present {
						tool_present = true;
						active_idx = pos;
					}
					continue;
				}

				if let Some(component) = &placed.component {
					if catalog.provides(tool, component) {
						overlaps = true;
					}
				}
			}

			if let (Some(placed_tool), Some(component)) = (&placed.tool, &augment.component) {
				if catalog.provides(placed_tool, component) {
					if overlaps || tool_present {
						return OrderOutcome::Incompatible(augment.id, placed.id);
					}
					active_idx = pos + 1;
				}
			}
		}

		ordered.insert(active_idx, idx);
	}

	OrderOutcome::Ordered(ordered)
}

#[cfg(test)]
mod tests {
	use std::rc::Rc;

	use super::*;
	use crate::catalog::Discovery;
	use crate::environment::ToolError;
	use crate::specification::Specification;

	fn catalog(tools: &[(&str, &[(&str, bool)])]) -> ToolCatalog {
		let definitions: Vec<(String, Discovery)> = tools.iter().map(|(tool, components)| {
			let components = components.iter()
				.map(|(c, no_overlap)| (c.to_string(), if *no_overlap { ComponentFlags::NO_OVERLAP } else { ComponentFlags::empty() }))
				.collect();
			(tool.to_string(), Discovery { chain: vec![tool.to_string()], components })
		}).collect();

		let mut catalog = ToolCatalog::new(definitions.iter().map(|(t, _)| t.clone()), vec![]);
		let mut discover = |tool: &str| {
			definitions.iter()
				.find(|(t, _)| t == tool)
				.map(|(_, d)| d.clone())
				.ok_or_else(|| ToolError::NotFound(tool.to_owned()))
		};
		for (tool, _) in tools {
			catalog.add_tool(tool, &mut discover);
		}
		catalog
	}

	fn augment(id: usize, component: &str, tool: Option<&str>) -> Augment<()> {
		let spec = Rc::new(Specification::new(component, [component], [], []));
		let mut augment = Augment::new(AugmentId(id), spec);
		augment.component = Some(component.to_owned());
		augment.tool = tool.map(str::to_owned);
		augment
	}

	fn apply(augments: &[Augment<()>], outcome: OrderOutcome) -> Vec<Augment<()>> {
		match outcome {
			OrderOutcome::Ordered(order) => order.into_iter().map(|i| augments[i].clone()).collect(),
			OrderOutcome::Incompatible(a, b) => panic!("unexpected incompatibility between {:?} and {:?}", a, b),
		}
	}

	fn ids(augments: &[Augment<()>]) -> Vec<usize> {
		augments.iter().map(|a| a.id.0).collect()
	}

	#[test]
	fn independent_augments_keep_their_order() {
		let catalog = catalog(&[("gcc", &[("CC", false)]), ("gas", &[("AS", false)])]);
		let augments = vec![augment(0, "CC", Some("gcc")), augment(1, "AS", Some("gas")), augment(2, "LIBPATH", None)];

		assert_eq!(order_augments(&augments, &catalog), OrderOutcome::Ordered(vec![0, 1, 2]));
	}

	#[test]
	fn shadowing_tool_is_applied_first() {
		/* T1 also sets CC, so T2 must come after it for its CC to be active */
		let catalog = catalog(&[("T1", &[("CC", false), ("AS", true)]), ("T2", &[("CC", false)])]);
		let augments = vec![augment(0, "CC", Some("T2")), augment(1, "AS", Some("T1"))];

		let ordered = apply(&augments, order_augments(&augments, &catalog));
		assert_eq!(ids(&ordered), [1, 0]);
	}

	#[test]
	fn ordering_is_idempotent() {
		let catalog = catalog(&[("T1", &[("CC", false), ("AS", true)]), ("T2", &[("CC", false)]), ("T3", &[("LINK", false)])]);
		let augments = vec![augment(0, "CC", Some("T2")), augment(1, "LINK", Some("T3")), augment(2, "AS", Some("T1"))];

		let once = apply(&augments, order_augments(&augments, &catalog));
		let twice = apply(&once, order_augments(&once, &catalog));
		assert_eq!(ids(&once), ids(&twice));
		assert_eq!(order_augments(&once, &catalog), OrderOutcome::Ordered(vec![0, 1, 2]));
	}

	#[test]
	fn shared_tool_forms_one_block() {
		let catalog = catalog(&[("T1", &[("LINK", true), ("OBJ", false)]), ("T2", &[("CC", false)])]);
		let augments = vec![augment(0, "LINK", Some("T1")), augment(1, "CC", Some("T2")), augment(2, "OBJ", Some("T1"))];

		let ordered = apply(&augments, order_augments(&augments, &catalog));
		let tools: Vec<_> = ordered.iter().map(|a| a.tool.clone().unwrap()).collect();
		let first = tools.iter().position(|t| t == "T1").unwrap();
		assert_eq!(tools[first + 1], "T1");
	}

	#[test]
	fn mutual_shadowing_is_incompatible() {
		let catalog = catalog(&[("T1", &[("CC", false), ("AS", false)]), ("T2", &[("CC", false), ("AS", false)])]);
		let augments = vec![augment(0, "AS", Some("T1")), augment(1, "CC", Some("T2"))];

		assert_eq!(order_augments(&augments, &catalog), OrderOutcome::Incompatible(AugmentId(0), AugmentId(1)));
	}

	#[test]
	fn exclusive_components_of_one_tool_are_incompatible() {
		let catalog = catalog(&[("T1", &[("LINK", true), ("OBJ", true)])]);
		let augments = vec![augment(0, "LINK", Some("T1")), augment(1, "OBJ", Some("T1"))];

		assert_eq!(order_augments(&augments, &catalog), OrderOutcome::Incompatible(AugmentId(0), AugmentId(1)));
	}

	#[test]
	fn native_components_are_never_shadowed_by_themselves() {
		let catalog = catalog(&[("gcc", &[("CC", false)])]);
		let augments = vec![augment(0, "CC", None), augment(1, "LIBPATH", None)];

		assert_eq!(order_augments(&augments, &catalog), OrderOutcome::Ordered(vec![0, 1]));
	}
}
