#[macro_use]
mod macros;

mod deployments;
mod frontend;

use frontend::cli;

pub fn main() {
    cli::main();
}
