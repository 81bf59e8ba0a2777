#![allow(unused_assignments)] // thiserror/miette proc macros trigger false positives

pub mod cli;
pub mod command;
pub mod config;
pub mod definition;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod paths;
pub mod proxmox;
pub mod reply;
pub mod serve;
pub mod whitelist;
