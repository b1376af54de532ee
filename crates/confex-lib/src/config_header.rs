//! The configuration header checks may write defines into.

use std::path::Path;

/// Preprocessor defines in the order they were first recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigHeader {
	defines: Vec<(String, Option<String>)>,
}

impl ConfigHeader {
	/// Records `name`, replacing the value of an earlier define with the same name.
	pub fn define(&mut self, name: impl Into<String>, value: Option<String>) {
		let name = name.into();
		match self.defines.iter_mut().find(|(n, _)| *n == name) {
			Some(existing) => existing.1 = value,
			None => self.defines.push((name, value)),
		}
	}

	pub fn get(&self, name: &str) -> Option<Option<&str>> {
		self.defines.iter()
			.find(|(n, _)| n == name)
			.map(|(_, v)| v.as_deref())
	}

	pub fn defines(&self) -> &[(String, Option<String>)] {
		&self.defines
	}

	pub fn len(&self) -> usize {
		self.defines.len()
	}

	pub fn is_empty(&self) -> bool {
		self.defines.is_empty()
	}

	/// Renders the header with an include guard derived from `file_name`.
	pub fn render(&self, file_name: &str) -> String {
		let guard: String = file_name.chars()
			.map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
			.collect();

		let mut out = format!("#ifndef {0}_SEEN\n#define {0}_SEEN\n\n", guard);
		for (name, value) in &self.defines {
			match value {
				Some(v) => out.push_str(&format!("#define {} {}\n", name, v)),
				None => out.push_str(&format!("#define {}\n", name)),
			}
		}
		out.push_str(&format!("\n#endif /* {}_SEEN */\n", guard));
		out
	}

	pub fn write_to(&self, path: &Path) -> crate::Result<()> {
		let file_name = path.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_else(|| "config.h".to_owned());

		log::debug!("Writing configuration header to {}", path.display());
		std::fs::write(path, self.render(&file_name))?;
		Ok(())
	}
}
