pub mod file;
pub mod returns;
pub mod stdin;
