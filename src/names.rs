//! Mapping of source names onto shell identifiers.

/// Shell variables with special meaning; user bindings named like these get a prefix.
const SPECIAL_VARS: &[&str] = &[
    "CDPATH", "ENV", "HOME", "IFS", "LANG", "LINENO", "OLDPWD", "OPTARG", "OPTIND", "PATH",
    "PPID", "PS1", "PS2", "PS4", "PWD", "RANDOM", "SHELL", "TERM", "TMPDIR",
];

/// Builtins and utilities a shell function must not shadow.
const SHELL_WORDS: &[&str] = &[
    "alias", "break", "case", "cat", "cd", "command", "continue", "do", "done", "echo", "elif",
    "else", "esac", "eval", "exec", "exit", "export", "false", "fi", "for", "function", "getopts",
    "if", "in", "kill", "local", "mktemp", "printf", "pwd", "read", "readonly", "return", "rm",
    "set", "shift", "test", "then", "trap", "true", "type", "ulimit", "umask", "unset", "until",
    "wait", "while",
];

pub const RUNTIME_PREFIX: &str = "__rt_";

fn needs_escape(name: &str) -> bool {
    name.starts_with(RUNTIME_PREFIX) || name.starts_with("v_")
}

/// Shell variable holding a source binding.
pub fn var(name: &str) -> String {
    if SPECIAL_VARS.contains(&name) || needs_escape(name) {
        format!("v_{}", name)
    } else {
        name.to_string()
    }
}

/// Shell function implementing a free function.
pub fn function(name: &str) -> String {
    if SHELL_WORDS.contains(&name) || name.starts_with(RUNTIME_PREFIX) || name.starts_with("fn_") {
        format!("fn_{}", name)
    } else {
        name.to_string()
    }
}

/// Shell function implementing `Type::method`.
pub fn method(type_name: &str, method: &str) -> String {
    format!("{}__{}", type_name, method)
}

/// Flattened variable for one struct field (`user` + `address` = `user_address`).
pub fn field(prefix: &str, field: &str) -> String {
    format!("{}_{}", prefix, field)
}

/// Variable carrying a struct binding's runtime type name.
pub fn type_sentinel(prefix: &str) -> String {
    format!("{}__type", prefix)
}

/// Generator temporary `n`.
pub fn temp(n: usize) -> String {
    format!("{}t{}", RUNTIME_PREFIX, n)
}

/// Global slot a function copies a returned struct into.
pub fn return_slot(function: &str) -> String {
    format!("{}ret_{}", RUNTIME_PREFIX, function)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(var("count"), "count");
        assert_eq!(function("greet"), "greet");
    }

    #[test]
    fn special_names_are_prefixed() {
        assert_eq!(var("PATH"), "v_PATH");
        assert_eq!(var("__rt_ret"), "v___rt_ret");
        assert_eq!(function("test"), "fn_test");
        assert_eq!(function("fn_x"), "fn_fn_x");
    }

    #[test]
    fn struct_paths_compose() {
        let city = field(&field("user", "address"), "city");
        assert_eq!(city, "user_address_city");
        assert_eq!(type_sentinel("user"), "user__type");
        assert_eq!(method("Point", "move_by"), "Point__move_by");
    }
}
