use colored::*;
use regex::Regex;
use std::sync::LazyLock;

static UNDEFINED_SYMBOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"undefined reference to [`']([^`']+)'|unresolved external symbol "?([A-Za-z_][\w@]*)|"(_?[A-Za-z_]\w*)", referenced from"#)
        .expect("valid symbol pattern")
});

static MISSING_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"fatal error: '?([^':]+?)'?:? (?:No such file or directory|file not found)|cannot open include file: '([^']+)'"#)
        .expect("valid header pattern")
});

/// Failure shapes kiln knows how to explain.
#[derive(Debug, PartialEq, Eq)]
enum Diagnosis {
    MissingMain,
    UndefinedSymbol(Option<String>),
    MissingHeader(Option<String>),
}

/// Turns raw toolchain output into a short hint pointing at the `kiln.toml` key
/// that most likely fixes it.
pub struct FeedbackAnalyzer;

impl FeedbackAnalyzer {
    pub fn analyze(output: &str) -> Option<String> {
        Self::diagnose(output).map(Self::hint)
    }

    fn diagnose(output: &str) -> Option<Diagnosis> {
        if output.contains("undefined reference to `main'")
            || output.contains("entry point must be defined")
            || output.contains("\"_main\", referenced from")
        {
            return Some(Diagnosis::MissingMain);
        }

        if let Some(caps) = UNDEFINED_SYMBOL.captures(output) {
            let symbol = caps.iter().skip(1).flatten().next().map(|m| m.as_str().to_string());
            return Some(Diagnosis::UndefinedSymbol(symbol));
        }
        if output.contains("Undefined symbols") || output.contains("LNK2019") {
            return Some(Diagnosis::UndefinedSymbol(None));
        }

        if let Some(caps) = MISSING_HEADER.captures(output) {
            let header = caps.iter().skip(1).flatten().next().map(|m| m.as_str().to_string());
            return Some(Diagnosis::MissingHeader(header));
        }

        None
    }

    fn hint(diagnosis: Diagnosis) -> String {
        match diagnosis {
            Diagnosis::MissingMain => format!(
                "No {} was linked.\nCheck that the file defining it sits under a {} {} in kiln.toml and has a registered extension.",
                "main()".bold().yellow(),
                "[[path]]".bold().yellow(),
                "dir".bold().yellow()
            ),
            Diagnosis::UndefinedSymbol(symbol) => {
                let what = match symbol {
                    Some(name) => format!("Linker could not resolve {}.", name.bold().red()),
                    None => format!("{} found undefined symbols.", "Linker".bold().red()),
                };
                format!(
                    "{}\nAdd the library to {} under {}, or register the directory that defines it as a {} entry.",
                    what,
                    "libs".bold().yellow(),
                    "[link]".bold().yellow(),
                    "[[path]]".bold().yellow()
                )
            }
            Diagnosis::MissingHeader(header) => {
                let what = match header {
                    Some(name) => format!("{} {} was not found.", "Missing Header".bold().red(), name.bold()),
                    None => format!("{} in an #include.", "Missing Header".bold().red()),
                };
                format!(
                    "{}\nAdd {} to {} {} for every source, or to that directory's {} {}.",
                    what,
                    "-I<dir>".bold().green(),
                    "[[language]]".bold().yellow(),
                    "flags".bold().yellow(),
                    "[[path]]".bold().yellow(),
                    "flags".bold().yellow()
                )
            }
        }
    }
}
