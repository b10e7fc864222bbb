/// A value that was either recognized as a known variant `T`, or is an
/// unrecognized raw value `Raw`.
///
/// Similar to `Result<T, Raw>`, but an unknown value is not an error; the raw
/// value is kept so callers can still display or match on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Recognized<T, Raw = String> {
    Known(T),
    Unknown(Raw),
}

impl<T: Copy, Raw: Copy> Copy for Recognized<T, Raw> {}

impl<T, Raw> From<T> for Recognized<T, Raw> {
    fn from(value: T) -> Self {
        Recognized::Known(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values_convert() {
        let known: Recognized<u8, char> = 3.into();
        assert_eq!(known, Recognized::Known(3));
        assert_ne!(known, Recognized::Unknown('3'));
    }
}
