//! パース関連のユーティリティ関数

use crate::object::ObjectKind;
use anyhow::{Context, Result};

/// アドレス文字列をu64にパース
///
/// 16進数（0xプレフィックス付き）または10進数をサポートします。
/// 桁区切りの `_` は無視します。
///
/// # Examples
/// ```
/// use nozoki_core::parse::parse_address;
///
/// assert_eq!(parse_address("0x1234").unwrap(), 0x1234);
/// assert_eq!(parse_address("0x7f00_0000_1001").unwrap(), 0x7f00_0000_1001);
/// assert_eq!(parse_address("1234").unwrap(), 1234);
/// ```
pub fn parse_address(s: &str) -> Result<u64> {
    let trimmed = s.trim();
    let digits = trimmed.replace('_', "");

    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        // 16進数
        u64::from_str_radix(hex, 16)
            .map_err(|e| anyhow::anyhow!("Invalid hexadecimal address '{}': {}", trimmed, e))
    } else {
        // 10進数でもダメなら16進数として解釈を試みる
        digits
            .parse::<u64>()
            .or_else(|_| u64::from_str_radix(&digits, 16))
            .map_err(|e| anyhow::anyhow!("Invalid address '{}': {}", trimmed, e))
    }
}

/// インスタンス型の対応 `<TYPE>=<Kind>` をパース
///
/// # Examples
/// ```
/// use nozoki_core::parse::parse_instance_type;
/// use nozoki_core::ObjectKind;
///
/// assert_eq!(
///     parse_instance_type("0x83=FixedArray").unwrap(),
///     (0x83, ObjectKind::FixedArray)
/// );
/// ```
pub fn parse_instance_type(s: &str) -> Result<(u16, ObjectKind)> {
    let (instance_type, kind) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected <TYPE>=<Kind>, got '{}'", s))?;

    let value = parse_address(instance_type)?;
    let instance_type = u16::try_from(value)
        .with_context(|| format!("Instance type 0x{:x} does not fit in 16 bits", value))?;
    let kind: ObjectKind = kind.trim().parse()?;
    Ok((instance_type, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_hex() {
        assert_eq!(parse_address("0x1234").unwrap(), 0x1234);
        assert_eq!(parse_address("0X1234").unwrap(), 0x1234);
        assert_eq!(parse_address("0xABCD").unwrap(), 0xabcd);
        assert_eq!(parse_address("0x7f00_0000_0000").unwrap(), 0x7f00_0000_0000);
    }

    #[test]
    fn test_parse_address_dec() {
        assert_eq!(parse_address("1234").unwrap(), 1234);
        assert_eq!(parse_address(" 1_000 ").unwrap(), 1000);
    }

    #[test]
    fn test_parse_address_invalid() {
        assert!(parse_address("xyz").is_err());
        assert!(parse_address("0xghij").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_parse_instance_type() {
        assert_eq!(
            parse_instance_type("0x10=JSArray").unwrap(),
            (0x10, ObjectKind::JSArray)
        );
        assert_eq!(
            parse_instance_type("131 = v8::internal::FixedArray").unwrap(),
            (131, ObjectKind::FixedArray)
        );
        assert!(parse_instance_type("0x10").is_err());
        assert!(parse_instance_type("0x10000=JSArray").is_err());
        assert!(parse_instance_type("0x10=Nope").is_err());
    }
}
