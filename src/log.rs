//! Build log with explicit scoped indentation.
//!
//! The log is a value passed into every component rather than process-global
//! state. `indented()` returns a guard that restores the previous indentation
//! level when dropped, so nesting always unwinds correctly on early returns.

use std::cell::Cell;
use std::fmt::Display;
use std::rc::Rc;

use console::style;

/// Log sink for build output
#[derive(Clone, Debug, Default)]
pub struct Log {
    indent: Rc<Cell<usize>>,
    verbose: bool,
}

impl Log {
    pub fn new(verbose: bool) -> Self {
        Self {
            indent: Rc::new(Cell::new(0)),
            verbose,
        }
    }

    fn prefix(&self) -> String {
        "  ".repeat(self.indent.get())
    }

    /// Print a progress line at the current indentation level
    pub fn info(&self, message: impl Display) {
        println!("{}{}", self.prefix(), message);
    }

    /// Print a line only when verbose output is enabled (e.g. the exact
    /// external commands being run)
    pub fn debug(&self, message: impl Display) {
        if self.verbose {
            println!("{}{}", self.prefix(), style(message.to_string()).dim());
        }
    }

    /// Print a warning; warnings never abort the build
    pub fn warn(&self, message: impl Display) {
        eprintln!(
            "{}{} {}",
            self.prefix(),
            style("Warning:").yellow().bold(),
            message
        );
    }

    /// Increase the indentation level until the returned guard is dropped
    pub fn indented(&self) -> IndentGuard {
        let prev = self.indent.get();
        self.indent.set(prev + 1);
        IndentGuard {
            indent: Rc::clone(&self.indent),
            prev,
        }
    }
}

/// Restores the previous indentation level on drop
pub struct IndentGuard {
    indent: Rc<Cell<usize>>,
    prev: usize,
}

impl Drop for IndentGuard {
    fn drop(&mut self) {
        self.indent.set(self.prev);
    }
}
