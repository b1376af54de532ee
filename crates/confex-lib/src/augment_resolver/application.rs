//! Bringing the working environment up to date with as little re-application as possible.

use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ApplicationPlan {
	/// Rebuild from the base environment and apply every tool.
	Reset,
	/// The applied tools are a usable prefix, apply the target tools from this index on.
	Append(usize),
}

/// Decides how `target` can be brought about given the tools already applied.
///
/// Tools of `target` already applied must sit at the end of `applied`, in the same relative order,
/// otherwise something applied after them could shadow their components. With `exact` the environment
/// may also not hold any tool outside `target`.
pub(super) fn plan_application(applied: &[String], target: &[String], exact: bool) -> ApplicationPlan {
	if exact && applied.iter().any(|t| !target.contains(t)) {
		return ApplicationPlan::Reset;
	}

	/* Position in `applied` the next already applied target tool must be found at */
	let mut expected: Option<usize> = None;
	let mut append = target.len();

	for (i, tool) in target.iter().enumerate() {
		match applied.iter().position(|t| t == tool) {
			Some(actual) => {
				if i == 0 && (target.len() > 1 || actual + 1 == applied.len()) {
					expected = Some(actual);
				}

				if expected == Some(actual) {
					expected = Some(actual + 1);
				} else {
					return ApplicationPlan::Reset;
				}
			},
			None => match expected {
				None => append = 0,
				Some(e) if e == applied.len() => {
					if append == target.len() {
						append = i;
					}
				},
				Some(_) => return ApplicationPlan::Reset,
			},
		}
	}

	ApplicationPlan::Append(append)
}

impl<E: BuildEnvironment> AugmentResolver<E> {
	pub(super) fn reset_environment(&mut self) {
		log::debug!("Resetting environment...");
		self.current = self.base.clone();
		self.applied_tools.clear();
		self.applied_checks.clear();
	}

	/// Applies `tools` (skipping those the environment already reflects) then runs checks.
	///
	/// `required` checks always run. `optional` checks only run if they haven't since the last reset.
	/// Returns the checks that failed.
	pub(super) fn apply_env(&mut self, tools: &[String], exact: bool, required: &[Check<E>], optional: &[Check<E>]) -> Vec<Check<E>> {
		let mut seen = HashSet::new();
		let tools: Vec<String> = tools.iter().filter(|t| seen.insert(*t)).cloned().collect();

		let start = match plan_application(&self.applied_tools, &tools, exact) {
			ApplicationPlan::Reset => {
				self.reset_environment();
				0
			},
			ApplicationPlan::Append(start) => start,
		};

		let toolpath = self.catalog.borrow().toolpath().to_vec();
		for tool in &tools[start..] {
			let expected_len = self.current.tools().len() + 1;
			self.applied_tools.push(tool.clone());

			if let Err(e) = self.current.apply_tool(tool, &toolpath) {
				log::warn!("Failed to apply tool '{}': {}", tool, e);
			}

			/* Toolchains list the tools they load as well, only the explicitly applied tool is tracked */
			if self.current.tools().len() > expected_len {
				self.current.truncate_tools(expected_len);
			}
		}

		log::debug!("Validating environment augments...");
		let mut required_unique: Vec<Check<E>> = Vec::with_capacity(required.len());
		for check in required {
			if !required_unique.contains(check) {
				required_unique.push(check.clone());
			}
		}

		let mut failed = Vec::new();
		let ctx = CheckContext::new(&self.current, &self.header, self.header_authority);
		for (checks, is_required) in [(required_unique.as_slice(), true), (optional, false)] {
			for check in checks {
				if !self.applied_checks.contains(check) {
					self.applied_checks.push(check.clone());
				} else if !is_required {
					continue;
				}

				if !check.run(&ctx) {
					failed.push(check.clone());
				}
			}
		}

		failed
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn s(tools: &[&str]) -> Vec<String> {
		tools.iter().map(|t| t.to_string()).collect()
	}

	#[test]
	fn new_tools_are_appended() {
		assert_eq!(plan_application(&s(&[]), &s(&["a", "b"]), false), ApplicationPlan::Append(0));
		assert_eq!(plan_application(&s(&["a", "b"]), &s(&["c"]), false), ApplicationPlan::Append(0));
		assert_eq!(plan_application(&s(&["a", "b", "c"]), &s(&["b", "c", "d"]), false), ApplicationPlan::Append(2));
		assert_eq!(plan_application(&s(&["a", "b"]), &s(&["b", "x"]), false), ApplicationPlan::Append(1));
	}

	#[test]
	fn already_applied_tail_needs_nothing() {
		assert_eq!(plan_application(&s(&["a", "b", "c"]), &s(&["c"]), false), ApplicationPlan::Append(1));
		assert_eq!(plan_application(&s(&["a", "b", "c"]), &s(&["b", "c"]), false), ApplicationPlan::Append(2));
		assert_eq!(plan_application(&s(&[]), &s(&[]), false), ApplicationPlan::Append(0));
	}

	#[test]
	fn shadowed_or_reordered_tools_need_reset() {
		/* `b` and `c` were applied after `a` and may shadow it */
		assert_eq!(plan_application(&s(&["a", "b", "c"]), &s(&["a"]), false), ApplicationPlan::Reset);
		assert_eq!(plan_application(&s(&["a", "b", "c"]), &s(&["a", "c"]), false), ApplicationPlan::Reset);
		assert_eq!(plan_application(&s(&["a", "b"]), &s(&["b", "a"]), false), ApplicationPlan::Reset);
		/* `d` has to be applied before `a` */
		assert_eq!(plan_application(&s(&["a"]), &s(&["d", "a"]), false), ApplicationPlan::Reset);
		/* `x` would land in front of `c` */
		assert_eq!(plan_application(&s(&["a", "b", "c"]), &s(&["b", "x", "c"]), false), ApplicationPlan::Reset);
	}

	#[test]
	fn exact_application_rejects_extra_tools() {
		assert_eq!(plan_application(&s(&["a", "b"]), &s(&["b"]), true), ApplicationPlan::Reset);
		assert_eq!(plan_application(&s(&["a", "b"]), &s(&["a", "b"]), true), ApplicationPlan::Append(2));
		assert_eq!(plan_application(&s(&["a"]), &s(&[]), true), ApplicationPlan::Reset);
		assert_eq!(plan_application(&s(&[]), &s(&[]), true), ApplicationPlan::Append(0));
	}
}
