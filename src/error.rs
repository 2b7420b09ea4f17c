//! Error types shared by the relay, matcher, loader, and indicator.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::patterns::PatternClass;

/// The wrapped command could not be started. Fatal before any relay work.
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("argument contains a NUL byte: {0:?}")]
    InvalidArgument(String),

    #[error("openpty failed: {0}")]
    OpenPty(#[source] io::Error),

    #[error("fork failed: {0}")]
    Fork(#[source] io::Error),

    #[error("failed to spawn `{command}`: {source}")]
    Exec {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// One configured pattern failed to compile and was skipped.
#[derive(Error, Debug)]
#[error("invalid {class} pattern {pattern:?}: {source}")]
pub struct PatternError {
    pub class: PatternClass,
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Unexpected PTY I/O failure after the child is alive.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("read from PTY failed: {0}")]
    Read(#[source] io::Error),

    #[error("write to PTY failed: {0}")]
    Write(#[source] io::Error),
}

/// The external indicator call failed. Logged, never fatal.
#[derive(Error, Debug)]
pub enum EmitterError {
    #[error("could not launch indicator `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("indicator `{program}` exited with {status}")]
    Status { program: String, status: ExitStatus },
}

/// A profile candidate could not be used; the loader moves on to the next one.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
