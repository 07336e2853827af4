//! Remote path composition.
//!
//! Remote stores are addressed with `/` no matter what the local platform
//! uses, so every join here is a plain string join.

/// Resolve the remote root for a run: `root/run_id`.
///
/// A trailing `/` on the root (or a leading one on the run id) never
/// produces a doubled separator.
pub fn run_path(root: &str, run_id: &str) -> String {
    join(root, run_id)
}

/// Resolve the remote path of a file given its path relative to the local
/// output directory. Backslash separators are converted to `/`.
pub fn remote_path(run_root: &str, relative: &str) -> String {
    let relative = relative.replace('\\', "/");
    let relative = relative.strip_prefix("./").unwrap_or(&relative);
    join(run_root, relative)
}

fn join(base: &str, child: &str) -> String {
    let child = child.trim_start_matches('/');
    if base.is_empty() {
        return child.to_string();
    }
    if child.is_empty() {
        return base.to_string();
    }
    if base.ends_with('/') {
        format!("{}{}", base, child)
    } else {
        format!("{}/{}", base, child)
    }
}
