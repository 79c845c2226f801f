pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Checks a caller-supplied argument, returning `InvalidArgument` from the
/// enclosing function when the condition does not hold.
///
/// ```
/// fn splits(num_splits: usize) -> ftgs_common::Result<usize> {
///     ftgs_common::verify_arg!(num_splits, num_splits > 0);
///     Ok(num_splits)
/// }
/// assert!(splits(0).is_err());
/// ```
#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

/// Checks a property of decoded on-disk data, returning `InvalidFormat` from the
/// enclosing function when it does not hold.
#[macro_export]
macro_rules! verify_data {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_data(result, stringify!($name), stringify!($expr))?;
    }};
}

#[inline]
pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_arg(name, condition)
    }
}

#[inline]
pub fn verify_data(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_format(name, condition)
    }
}

#[cold]
pub fn invalid_arg(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::Error::invalid_arg(name, condition))
}

#[cold]
pub fn invalid_format(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::Error::invalid_format(name, condition))
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;

    fn check_splits(num_splits: usize) -> super::Result<()> {
        verify_arg!(num_splits, num_splits > 0);
        Ok(())
    }

    fn check_freq(doc_freq: i32) -> super::Result<()> {
        verify_data!(doc_freq, doc_freq > 0);
        Ok(())
    }

    #[test]
    fn test_verify_arg() {
        assert!(check_splits(3).is_ok());
        let err = check_splits(0).unwrap_err();
        match err.kind() {
            ErrorKind::InvalidArgument { name, message } => {
                assert_eq!(name, "num_splits");
                assert_eq!(message, "num_splits > 0");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_verify_data() {
        assert!(check_freq(1).is_ok());
        assert!(matches!(
            check_freq(0).unwrap_err().kind(),
            ErrorKind::InvalidFormat { .. }
        ));
        let err = check_freq(-1).unwrap_err();
        assert!(err.to_string().contains("doc_freq > 0"), "{err}");
    }
}
