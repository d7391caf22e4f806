//! `ncopy` command-line front end.

pub mod commands;
