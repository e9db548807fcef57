/// Build-time package metadata, exposed for diagnostics and version
/// reporting in the demo binary.
pub struct Package;

impl Package {
    /// The semantic version of the crate that was built.
    /// Pulled from `CARGO_PKG_VERSION`, set by Cargo from `Cargo.toml`.
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    /// The commit hash the binary was built from, if supplied at compile
    /// time via the `WORKHIVE_COMMIT_HASH` env var; "unknown" otherwise.
    pub const COMMIT_HASH: &'static str = match option_env!("WORKHIVE_COMMIT_HASH") {
        Some(h) => h,
        None => "unknown",
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!Package::VERSION.is_empty());
    }

    #[test]
    fn commit_hash_has_default() {
        assert!(!Package::COMMIT_HASH.is_empty());
    }
}
