// Library side of the casslock command line tool
// The binary in main.rs only parses arguments and dispatches to these modules

pub mod command; // Subcommand implementations
pub mod model; // Command line arguments and settings resolution
pub mod startup; // Logging bootstrap
