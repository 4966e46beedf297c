use crate::host::HostEnv;

pub const FALLBACK_SOURCE: &str = "provenance-runtime";

/// Last path component, splitting on `/` and, on Windows, `\` as well.
fn basename(path: &str) -> &str {
    let sep = |c: char| c == '/' || (cfg!(windows) && c == '\\');
    path.rsplit(sep).next().unwrap_or(path)
}

/// Label identifying the program behind the log records.
///
/// Precedence: explicit override, the script (argv[1]), the interpreter
/// (argv[0]), the host program name, and finally a fixed fallback.
pub fn resolve_source(explicit: Option<&str>, host: &dyn HostEnv) -> String {
    if let Some(source) = explicit.filter(|s| !s.is_empty()) {
        return source.to_string();
    }

    let argv = host.argv();
    let arg_name = |i: usize| {
        argv.get(i)
            .map(|arg| basename(arg))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    };
    arg_name(1)
        .or_else(|| arg_name(0))
        .or_else(|| host.program_name().filter(|p| !p.is_empty()))
        .unwrap_or_else(|| FALLBACK_SOURCE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::FakeHost;

    #[test]
    fn test_explicit_source_wins() {
        let host = FakeHost::default().with_argv(&["python3", "/srv/app/main.py"]);
        assert_eq!(resolve_source(Some("billing"), &host), "billing");
    }

    #[test]
    fn test_script_basename() {
        let host = FakeHost::default().with_argv(&["python3", "/srv/app/main.py"]);
        assert_eq!(resolve_source(None, &host), "main.py");
    }

    #[test]
    fn test_interpreter_when_no_script() {
        let host = FakeHost::default().with_argv(&["/usr/bin/python3"]);
        assert_eq!(resolve_source(None, &host), "python3");
    }

    #[test]
    fn test_empty_script_name_falls_back_to_interpreter() {
        let mut host = FakeHost::default().with_argv(&["/usr/bin/python3", "/srv/app/"]);
        host.program_name = Some("embedded".to_string());
        assert_eq!(resolve_source(None, &host), "python3");

        let host = FakeHost::default().with_argv(&["python3", ""]);
        assert_eq!(resolve_source(None, &host), "python3");
    }

    #[test]
    fn test_program_name_then_fallback() {
        let mut host = FakeHost::default();
        host.program_name = Some("embedded".to_string());
        assert_eq!(resolve_source(None, &host), "embedded");

        assert_eq!(resolve_source(None, &FakeHost::default()), FALLBACK_SOURCE);
    }
}
