mod archive;
mod assets;
mod cli;
mod commands;
mod env_loader;
mod error;
mod logging;

fn main() {
    env_loader::load_dotenv();

    let cli = cli::parse();
    let logger = logging::Logger::new(cli.quiet());
    if let Err(err) = cli::run(cli) {
        logger.diagnostic(format!("error: {err:#}"));
        std::process::exit(1);
    }
}
