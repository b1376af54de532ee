//! Library error type.

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("no tool found that provides a suitable '{0}'")]
	ToolNotFound(String),
	#[error("library '{0}' not found")]
	LibraryNotFound(String),
	#[error("external program '{0}' not found")]
	ProgramNotFound(String),
	#[error("invalid input: {0}")]
	InvalidInput(String),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
}

impl Error {
	/// The display name of the requirement that could not be satisfied, if this is a search failure.
	pub fn requirement_name(&self) -> Option<&str> {
		match self {
			Error::ToolNotFound(name)
			| Error::LibraryNotFound(name)
			| Error::ProgramNotFound(name) => Some(name),
			_ => None,
		}
	}
}
