//! Path helpers for locally referenced credential files.

/// Expands a leading `~/`, `$HOME` or `{$HOME}` prefix to the user's home
/// directory.
///
/// Existing inventories commonly reference private keys as
/// `{$HOME}/.ssh/id_rsa`, so all three spellings are accepted. If the `HOME`
/// environment variable is not set, the input is returned unchanged.
///
/// # Examples
///
/// ```
/// # use rds_install::process::expand_home;
/// let home = std::env::var("HOME").expect("HOME should be set");
/// assert_eq!(expand_home("~/.ssh/id_ed25519"), format!("{home}/.ssh/id_ed25519"));
/// assert_eq!(expand_home("{$HOME}/.ssh/id_rsa"), format!("{home}/.ssh/id_rsa"));
/// assert_eq!(expand_home("/absolute/path"), "/absolute/path");
/// ```
#[must_use]
pub fn expand_home(path: &str) -> String {
    let rest = path
        .strip_prefix("~/")
        .map(|rest| (rest, true))
        .or_else(|| path.strip_prefix("{$HOME}").map(|rest| (rest, false)))
        .or_else(|| path.strip_prefix("$HOME").map(|rest| (rest, false)));

    if let Some((rest, needs_separator)) = rest
        && let Some(home) = std::env::var_os("HOME")
    {
        let home_dir = home.to_string_lossy();
        if needs_separator {
            return format!("{home_dir}/{rest}");
        }
        return format!("{home_dir}{rest}");
    }
    path.to_owned()
}
