// Parsers for command-line selection and breakpoint strings

pub mod breaks;
pub mod lexer;
pub mod selection;

// Public API re-exports
pub use breaks::parse_breakpoints;
pub use selection::parse_selection;
