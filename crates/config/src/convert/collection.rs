//! Arrays and collections built from tokenized values

use super::{ConversionContext, FromProperty};
use crate::core::{ConfigError, ConfigResult};
use indexmap::IndexSet;
use std::any::type_name;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::hash::Hash;

/// Tokenize `raw` and convert every token; the first bad token fails the
/// whole value
fn collect<C, T>(raw: &str, cx: &ConversionContext<'_>, target: &'static str) -> ConfigResult<C>
where
    C: FromIterator<T> + 'static,
    T: FromProperty,
{
    if let Some(whole) = cx.convert_whole::<C>(raw) {
        return whole;
    }

    cx.tokens(raw)?
        .iter()
        .map(|token| {
            T::from_property(token, cx).map_err(|cause| ConfigError::UnsupportedConversion {
                key: cx.key().to_string(),
                target,
                message: format!("cannot convert token '{token}': {cause}"),
                source: Some(Box::new(cause)),
            })
        })
        .collect()
}

impl<T: FromProperty> FromProperty for Vec<T> {
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        collect(raw, cx, type_name::<Self>())
    }
}

impl<T: FromProperty> FromProperty for VecDeque<T> {
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        collect(raw, cx, type_name::<Self>())
    }
}

impl<T: FromProperty> FromProperty for Box<[T]> {
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        collect(raw, cx, type_name::<Self>())
    }
}

/// Insertion-ordered set
impl<T: FromProperty + Eq + Hash> FromProperty for IndexSet<T> {
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        collect(raw, cx, type_name::<Self>())
    }
}

impl<T: FromProperty + Eq + Hash> FromProperty for HashSet<T> {
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        collect(raw, cx, type_name::<Self>())
    }
}

/// Naturally ordered set
impl<T: FromProperty + Ord> FromProperty for BTreeSet<T> {
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        collect(raw, cx, type_name::<Self>())
    }
}

impl<T: FromProperty, const N: usize> FromProperty for [T; N] {
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        if let Some(whole) = cx.convert_whole::<Self>(raw) {
            return whole;
        }

        let items: Vec<T> = collect(raw, cx, type_name::<Self>())?;
        let found = items.len();
        items.try_into().map_err(|_| {
            ConfigError::unsupported_conversion(
                cx.key(),
                type_name::<Self>(),
                format!("expected {N} elements, found {found}"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::convert;
    use crate::core::{BoxError, Converter, PropertyDef};

    #[test]
    fn test_lists_keep_order() {
        assert_eq!(convert::<Vec<i32>>("k", "3, 1,2").unwrap(), vec![3, 1, 2]);
        assert_eq!(
            convert::<VecDeque<String>>("k", "b,a").unwrap(),
            VecDeque::from(["b".to_string(), "a".to_string()])
        );
        assert_eq!(&*convert::<Box<[u8]>>("k", "1").unwrap(), &[1]);
        assert!(convert::<Vec<i32>>("k", "").unwrap().is_empty());
    }

    #[test]
    fn test_sets() {
        let ordered: IndexSet<String> = convert("k", "c, a, c, b").unwrap();
        assert_eq!(ordered.iter().collect::<Vec<_>>(), vec!["c", "a", "b"]);

        let sorted: BTreeSet<i64> = convert("k", "3,1,2,1").unwrap();
        assert_eq!(sorted.into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);

        let hashed: HashSet<u16> = convert("k", "1,1").unwrap();
        assert_eq!(hashed.len(), 1);
    }

    #[test]
    fn test_one_bad_token_fails_whole_value() {
        let err = convert::<Vec<i32>>("numbers", "1, 2, foo, 4").unwrap_err();
        match &err {
            ConfigError::UnsupportedConversion { key, source, .. } => {
                assert_eq!(key, "numbers");
                assert!(source.is_some());
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("foo"));
    }

    #[test]
    fn test_fixed_arrays() {
        assert_eq!(convert::<[u8; 3]>("k", "1,2,3").unwrap(), [1, 2, 3]);
        let err = convert::<[u8; 3]>("k", "1,2").unwrap_err();
        assert!(err.to_string().contains("expected 3 elements, found 2"));
    }

    struct Doubled;

    impl Converter for Doubled {
        type Output = i32;

        fn convert(&self, token: &str) -> Result<i32, BoxError> {
            Ok(token.parse::<i32>()? * 2)
        }
    }

    struct Reversed;

    impl Converter for Reversed {
        type Output = Vec<String>;

        fn convert(&self, token: &str) -> Result<Vec<String>, BoxError> {
            Ok(token.split(',').rev().map(str::to_string).collect())
        }
    }

    #[test]
    fn test_converter_on_collections() {
        let def = PropertyDef::new("k").converter(Doubled);
        let cx = ConversionContext::for_property("k", &def, None);
        assert_eq!(Vec::<i32>::from_property("1, 2", &cx).unwrap(), vec![2, 4]);

        let def = PropertyDef::new("k").converter(Reversed);
        let cx = ConversionContext::for_property("k", &def, None);
        assert_eq!(
            Vec::<String>::from_property("a,b", &cx).unwrap(),
            vec!["b".to_string(), "a".to_string()]
        );
    }
}
