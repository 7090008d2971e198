use clap::Parser;

fn main() -> miette::Result<()> {
    prog_run::Cli::parse().run()
}
