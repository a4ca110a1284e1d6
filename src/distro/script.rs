//! Install script rendering

use std::path::Path;

/// Quote a string for POSIX sh
pub(crate) fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Script header shared by all drivers
pub(crate) fn header(driver: &str, count: usize) -> String {
    format!(
        "#!/bin/sh\n# Generated by repro-fetch ({} driver, {} file(s))\nset -eu\n",
        driver, count
    )
}

/// `program args... \` followed by one quoted path per line
pub(crate) fn command_with_paths<'a>(
    program: &str,
    args: &[&str],
    paths: impl IntoIterator<Item = &'a Path>,
) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    for path in paths {
        line.push_str(" \\\n  ");
        line.push_str(&sh_quote(&path.to_string_lossy()));
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_single_quotes() {
        assert_eq!(sh_quote("a'b"), r"'a'\''b'");
        assert_eq!(sh_quote("/x y"), "'/x y'");
    }

    #[test]
    fn command_lists_one_path_per_line() {
        let out = command_with_paths("dpkg", &["-i"], [Path::new("/c/a"), Path::new("/c/b")]);
        assert_eq!(out, "dpkg -i \\\n  '/c/a' \\\n  '/c/b'\n");
    }
}
