mod scenario;

fn main() {
	env_logger::init();

	let mut opts;

	/* Parse console input */
	let parsed_options = {
		let args: Vec<String> = std::env::args().collect();

		opts = getopts::Options::new();
		opts.optflag( "h", "help",    "Show help");
		opts.optflag( "l", "listing", "List requests instead of resolving them");
		opts.optopt(  "o", "options", "Configure options file", "FILE");
		opts.optopt(  "H", "header",  "Write the configuration header to FILE", "FILE");
		opts.optmulti("t", "tool",    "Search TOOL before the environment's own tools", "TOOL");
		opts.optmulti("p", "toolpath", "Look for tool definitions in DIR", "DIR");
		opts.parsing_style(getopts::ParsingStyle::FloatingFrees);

		let parsed_options = match opts.parse(&args[1..]) {
			Ok(m)  => { m }
			Err(e) => { println!("Unable to parse options: {}", e); return }
		};

		if parsed_options.opt_present("h") {
			eprintln!("{}", opts.usage("Usage: confex-terminal [options] SCENARIO"));
			return;
		}

		parsed_options
	};

	let mut options = match parsed_options.opt_str("o") {
		Some(path) => confex::ConfigureOptions::load_from_file(&path).unwrap_or_else(|e| {
			log::warn!("Failed to read options file: {}", e);
			log::warn!("Using default options.");
			confex::ConfigureOptions::default()
		}),
		None => confex::ConfigureOptions::default(),
	};

	if parsed_options.opt_present("l") {
		options.set_listing(true);
	}
	let tools = parsed_options.opt_strs("t");
	if !tools.is_empty() {
		options.set_tools(tools);
	}
	let toolpath = parsed_options.opt_strs("p");
	if !toolpath.is_empty() {
		options.set_toolpath(toolpath);
	}
	if let Some(header) = parsed_options.opt_str("H") {
		if !options.set_config_header(header.clone().into()) {
			log::error!("Header directory for '{}' does not exist.", header);
			return;
		}
	}

	let scenario_path = match parsed_options.free.first() {
		Some(p) => p,
		None => { log::error!("Scenario file not provided."); return },
	};

	match run(scenario_path, options) {
		Ok(_) => {},
		Err(e) => {
			log::error!("Configuration failed: {}", e);
			std::process::exit(1);
		},
	}
}

fn run(scenario_path: impl AsRef<std::path::Path>, options: confex::ConfigureOptions) -> Result<(), Error> {
	let scenario = scenario::Scenario::load_from_file(scenario_path)?;

	let mut registry = confex::ToolRegistry::from_options(&options);
	let mut conf = confex::Configure::new(scenario.build_environment(), &mut registry, options);

	scenario.submit(&mut conf)?;
	let finished = conf.finish()?;

	if let Some(listing) = &finished.listing {
		println!("{}", serde_json::to_string_pretty(listing)?);
		return Ok(());
	}

	println!("Bindings:");
	for binding in &finished.bindings {
		println!("\t{}: {} via {}",
			binding.requirement,
			binding.component.as_deref().unwrap_or("-"),
			binding.tool.as_deref().unwrap_or("<base environment>"),
		);
	}

	println!("Applied tools: {:?}", confex::BuildEnvironment::tools(&finished.environment));

	if !finished.header.is_empty() {
		println!("{}", finished.header.render("config.h"));
	}

	Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("confex error: {0}")]
	Confex(#[from] confex::Error),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	#[error("request depends on unknown requirement '{0}'")]
	UnknownDependency(String),
}
