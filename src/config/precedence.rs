//! Field precedence: CLI flag, then config file, then package metadata, then
//! the built-in default.

/// First present value in precedence order.
pub fn pick<T>(cli: Option<T>, file: Option<T>, package: Option<T>) -> Option<T> {
    cli.or(file).or(package)
}

/// [`pick`] with a built-in default as the last tier.
pub fn pick_or<T>(cli: Option<T>, file: Option<T>, package: Option<T>, default: T) -> T {
    pick(cli, file, package).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_beats_everything() {
        assert_eq!(pick(Some(1), Some(2), Some(3)), Some(1));
    }

    #[test]
    fn file_beats_package() {
        assert_eq!(pick(None, Some(2), Some(3)), Some(2));
    }

    #[test]
    fn package_is_last_explicit_tier() {
        assert_eq!(pick(None, None, Some(3)), Some(3));
        assert_eq!(pick::<i32>(None, None, None), None);
    }

    #[test]
    fn default_only_when_all_tiers_absent() {
        assert_eq!(pick_or(None, None, None, 9), 9);
        assert_eq!(pick_or(None, Some(2), None, 9), 2);
    }
}
