//! Built-in rules for scalar targets

use super::{ConversionContext, FromProperty};
use crate::core::{ConfigError, ConfigResult};
use std::any::type_name;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Scalars parsed with `FromStr` from the trimmed value
macro_rules! from_str_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromProperty for $ty {
                fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
                    if let Some(custom) = cx.convert_custom::<Self>(raw) {
                        return custom;
                    }
                    raw.trim()
                        .parse::<$ty>()
                        .map_err(|e| {
                            ConfigError::conversion_caused_by(cx.key(), type_name::<$ty>(), e)
                        })
                }
            }
        )*
    };
}

from_str_scalar!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, IpAddr, Ipv4Addr,
    Ipv6Addr, SocketAddr, url::Url,
);

impl FromProperty for String {
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        if let Some(custom) = cx.convert_custom::<Self>(raw) {
            return custom;
        }
        Ok(raw.to_string())
    }
}

impl FromProperty for PathBuf {
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        if let Some(custom) = cx.convert_custom::<Self>(raw) {
            return custom;
        }
        Ok(PathBuf::from(raw.trim()))
    }
}

impl FromProperty for bool {
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        if let Some(custom) = cx.convert_custom::<Self>(raw) {
            return custom;
        }
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            other => Err(ConfigError::unsupported_conversion(
                cx.key(),
                "bool",
                format!("'{other}' is not a boolean"),
            )),
        }
    }
}

impl FromProperty for char {
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        if let Some(custom) = cx.convert_custom::<Self>(raw) {
            return custom;
        }
        let trimmed = raw.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(ConfigError::unsupported_conversion(
                cx.key(),
                "char",
                format!("'{trimmed}' is not a single character"),
            )),
        }
    }
}

impl FromProperty for Duration {
    fn from_property(raw: &str, cx: &ConversionContext<'_>) -> ConfigResult<Self> {
        if let Some(custom) = cx.convert_custom::<Self>(raw) {
            return custom;
        }
        parse_duration(raw).map_err(|message| {
            ConfigError::unsupported_conversion(cx.key(), "Duration", message)
        })
    }
}

/// Parse a duration such as `250`, `10s` or `1h 30m`
///
/// A bare integer means milliseconds; anything else goes through
/// `humantime`.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let trimmed = raw.trim();
    if let Ok(millis) = trimmed.parse::<u64>() {
        return Ok(Duration::from_millis(millis));
    }
    humantime::parse_duration(trimmed).map_err(|e| format!("'{trimmed}' is not a duration: {e}"))
}
