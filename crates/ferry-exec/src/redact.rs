/// Replacement shown instead of secret values.
pub const REDACTED: &str = "[REDACTED]";

/// Space-join a command line, hiding the value of every `key=value`
/// argument whose key mentions "password" (case-insensitive).
///
/// ```
/// use ferry_exec::redact::redact_command;
///
/// let args = ["docker", "login", "--password=bar"].map(String::from);
/// assert_eq!(redact_command(&args), "docker login --password=[REDACTED]");
/// ```
pub fn redact_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| redact_arg(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn redact_arg(arg: &str) -> String {
    match arg.split_once('=') {
        Some((key, _)) if key.to_ascii_lowercase().contains("password") => {
            format!("{key}={REDACTED}")
        }
        _ => arg.to_owned(),
    }
}
