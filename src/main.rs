//! # dataset-clean CLI
//!
//! Command-line interface for the dataset cleaner.
//!
//! ## Usage
//! ```bash
//! dataset-clean scan-corrupt data/train data/valid --workers 8
//! dataset-clean separate-rgb data/train --backend process
//! dataset-clean split data --val 0.2 --test 0.1
//! ```

mod cli;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
