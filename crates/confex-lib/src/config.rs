use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

/// Options shared by every [`crate::Configure`] created from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigureOptions {
	/// Tools searched, in order, before the tools already loaded in an environment.
	tools: Vec<String>,
	/// Extra directories handed to every tool application.
	toolpath: Vec<PathBuf>,
	/// Record requests instead of resolving them.
	listing: bool,
	/// Where the configuration header is written on finish.
	config_header: Option<PathBuf>,
}

impl ConfigureOptions {
	pub fn load_from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
		let path = path.as_ref();
		log::debug!("Loading configure options from {}", path.display());
		let file = std::fs::File::open(path)?;
		Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
	}

	pub fn tools(&self) -> &[String] {
		&self.tools
	}
	pub fn set_tools(&mut self, tools: impl IntoIterator<Item = impl Into<String>>) {
		self.tools = tools.into_iter().map(Into::into).collect();
	}

	pub fn toolpath(&self) -> &[PathBuf] {
		&self.toolpath
	}
	pub fn set_toolpath(&mut self, toolpath: impl IntoIterator<Item = impl Into<PathBuf>>) {
		self.toolpath = toolpath.into_iter().map(Into::into).collect();
	}

	pub fn listing(&self) -> bool {
		self.listing
	}
	pub fn set_listing(&mut self, listing: bool) {
		self.listing = listing;
	}

	pub fn config_header(&self) -> Option<&Path> {
		self.config_header.as_deref()
	}
	/// returns if the parent directory is valid or not.
	pub fn set_config_header(&mut self, path: PathBuf) -> bool {
		let parent_ok = match path.parent() {
			Some(parent) => parent.as_os_str().is_empty() || parent.is_dir(),
			None => false,
		};
		if parent_ok {
			self.config_header = Some(path);
		}
		parent_ok
	}
}
