use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetShell {
    #[default]
    Posix,
    Bash,
}

impl TargetShell {
    pub fn shebang(self) -> &'static str {
        match self {
            TargetShell::Bash => "#!/usr/bin/env bash",
            TargetShell::Posix => "#!/bin/sh",
        }
    }
}

impl fmt::Display for TargetShell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetShell::Bash => write!(f, "bash"),
            TargetShell::Posix => write!(f, "posix"),
        }
    }
}

impl FromStr for TargetShell {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bash" => Ok(TargetShell::Bash),
            "posix" | "sh" => Ok(TargetShell::Posix),
            other => Err(format!("unknown target `{}` (expected bash or posix)", other)),
        }
    }
}
