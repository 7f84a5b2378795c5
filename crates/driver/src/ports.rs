/// Name fragments of the controller's own ports.
pub(crate) const CONTROLLER_HINTS: [&str; 2] = ["minilab", "arturia"];

/// Name fragments of common loopback buses a DAW can listen on.
pub(crate) const LOOPBACK_HINTS: [&str; 5] = ["iac", "chordout", "loopmidi", "loopbe", "bus"];

/// Index of the port to use. A non-empty `wanted` is a case-insensitive
/// substring that must match; otherwise the first name containing any hint wins.
pub(crate) fn pick(names: &[String], wanted: &str, hints: &[&str]) -> Option<usize> {
    let wanted = wanted.trim().to_lowercase();
    let lowered: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
    if !wanted.is_empty() {
        return lowered.iter().position(|name| name.contains(&wanted));
    }
    lowered
        .iter()
        .position(|name| hints.iter().any(|hint| name.contains(hint)))
}
