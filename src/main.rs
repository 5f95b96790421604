use crate::cli::run;

pub mod archive;
pub mod cli;
pub mod config;
pub mod domain;
pub mod tools;

fn main() -> anyhow::Result<()> {
    run()
}
